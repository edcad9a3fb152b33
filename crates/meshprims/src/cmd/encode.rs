use std::io::{BufWriter, Read};

use meshprims_frame::FrameWriter;

use crate::cmd::{EncodeArgs, STDOUT_BUFFER};
use crate::exit::{frame_error, io_error, CliResult, SUCCESS};

pub fn run(args: EncodeArgs) -> CliResult<i32> {
    let payload = match args.data {
        Some(data) => data.into_bytes(),
        None => {
            let mut buf = Vec::new();
            std::io::stdin()
                .read_to_end(&mut buf)
                .map_err(|err| io_error("stdin read failed", err))?;
            buf
        }
    };

    let mut writer = FrameWriter::new(BufWriter::with_capacity(
        STDOUT_BUFFER,
        std::io::stdout().lock(),
    ));
    let written = writer
        .send(&payload)
        .map_err(|err| frame_error("encode failed", err))?;
    tracing::debug!(payload = payload.len(), wire = written, "frame encoded");

    Ok(SUCCESS)
}
