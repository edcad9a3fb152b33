use meshprims_frame::{FrameError, FrameReader};
use meshprims_transport::InboundFrame;

use crate::cmd::DecodeArgs;
use crate::exit::{frame_error, CliResult, SUCCESS};
use crate::output::{print_frame, OutputFormat};

pub fn run(args: DecodeArgs, format: OutputFormat) -> CliResult<i32> {
    let mut reader = FrameReader::new(std::io::stdin().lock());
    let mut printed = 0usize;

    loop {
        let payload = match reader.read_frame() {
            Ok(payload) => payload,
            Err(FrameError::ConnectionClosed) => break,
            Err(err) => return Err(frame_error("decode failed", err)),
        };

        print_frame(
            &InboundFrame {
                interface: "stdin".to_string(),
                payload,
            },
            format,
        );
        printed = printed.saturating_add(1);

        if args.count.is_some_and(|count| printed >= count) {
            break;
        }
    }

    tracing::debug!(frames = printed, "decode finished");
    Ok(SUCCESS)
}
