use std::io::BufWriter;

use meshprims_frame::{FrameError, FrameReader, FrameWriter};

use crate::cmd::{EchoArgs, STDOUT_BUFFER};
use crate::exit::{frame_error, CliResult, SUCCESS};

pub fn run(args: EchoArgs) -> CliResult<i32> {
    let mut reader = FrameReader::new(std::io::stdin().lock());
    // Buffer whole frames so each send is a single complete write.
    let mut writer = FrameWriter::new(BufWriter::with_capacity(
        STDOUT_BUFFER,
        std::io::stdout().lock(),
    ));
    let mut echoed = 0usize;

    loop {
        let payload = match reader.read_frame() {
            Ok(payload) => payload,
            Err(FrameError::ConnectionClosed) => break,
            Err(err) => return Err(frame_error("receive failed", err)),
        };

        tracing::info!(size = payload.len(), "echoing frame");
        writer
            .send(&payload)
            .map_err(|err| frame_error("echo send failed", err))?;
        echoed = echoed.saturating_add(1);

        if args.max_frames.is_some_and(|max| echoed >= max) {
            break;
        }
    }

    tracing::debug!(frames = echoed, "echo finished");
    Ok(SUCCESS)
}
