use anyhow::{Context, Result};
use error::Error;
use indicatif::{ProgressBar, ProgressStyle};
use protocol::{Request, Response};
use rand::{rngs::StdRng, Rng, SeedableRng};
use session::Session;
use std::{
    fs::File,
    io::{self, BufRead, BufReader},
    path::PathBuf,
    sync::{
        atomic::{AtomicBool, Ordering},
        mpsc::{sync_channel, Receiver, RecvTimeoutError},
        Arc,
    },
    thread,
    time::Duration,
};
use structopt::StructOpt;
use tracing::{info, warn};
use tracing_subscriber::layer::SubscriberExt;

mod detector;
mod error;
mod feedback;
mod geometry;
mod pose;
mod protocol;
mod session;
mod summary;

/// How long the processing loop waits for a line before checking for Ctrl-C.
const POLL_INTERVAL: Duration = Duration::from_millis(100);

#[derive(structopt::StructOpt)]
struct Opt {
    /// JSON-lines file of requests. Reads stdin when omitted.
    input: Option<PathBuf>,

    #[structopt(short, long, default_value = "info", env = "RUST_LOG")]
    log_level: tracing_subscriber::filter::EnvFilter,

    /// Maximum number of parsed lines waiting to be processed.
    #[structopt(short, long, default_value = "1000")]
    queue_size: usize,

    /// Seed for picking completion phrases, for reproducible runs.
    #[structopt(long)]
    seed: Option<u64>,

    #[structopt(short, long)]
    show_progress: bool,

    #[structopt(flatten)]
    thresholds: detector::Thresholds,
}

fn open_input(path: Option<&PathBuf>) -> Result<Box<dyn BufRead + Send>, Error> {
    Ok(match path {
        Some(path) => Box::new(BufReader::new(
            File::open(path).map_err(|e| Error::OpenInput(e, path.clone()))?,
        )),
        None => Box::new(BufReader::new(std::io::stdin())),
    })
}

/// Answer for a line that could not be read or parsed.
fn rejected(error: Error, line_number: usize) -> Response {
    warn!(%error, line = line_number, "ignoring unusable input line");
    Response::Error {
        message: format!("{:#}", anyhow::Error::from(error)),
    }
}

/// The response to one input line. Blank lines get none.
fn respond<R>(
    session: &mut Session<R>,
    line_number: usize,
    line: io::Result<String>,
) -> Option<Response>
where
    R: Rng,
{
    let line = match line {
        Ok(line) => line,
        Err(e) => return Some(rejected(Error::ReadInput(e, line_number), line_number)),
    };

    if line.trim().is_empty() {
        return None;
    }

    Some(match Request::parse(&line, line_number) {
        Ok(request) => session.handle(request),
        Err(error) => rejected(error, line_number),
    })
}

/// Answer lines until input ends, Ctrl-C is pressed, or stdout fails.
fn serve<R>(
    session: &mut Session<R>,
    lines_rx: Receiver<(usize, io::Result<String>)>,
    running: &AtomicBool,
    pb_frames: Option<&ProgressBar>,
) -> Result<()>
where
    R: Rng,
{
    let stdout = std::io::stdout();

    while running.load(Ordering::SeqCst) {
        let (line_number, line) = match lines_rx.recv_timeout(POLL_INTERVAL) {
            Ok(received) => received,
            Err(RecvTimeoutError::Timeout) => continue,
            Err(RecvTimeoutError::Disconnected) => break,
        };

        let response = match respond(session, line_number, line) {
            Some(response) => response,
            None => continue,
        };

        response
            .write_line(stdout.lock())
            .context("failed writing response")?;

        if let Some(pb_frames) = pb_frames {
            pb_frames.set_message(format!(
                "frames: {}, perfect squats: {}",
                session.frames_received(),
                session.count()
            ));
            pb_frames.inc(1);
        }
    }

    Ok(())
}

fn main() -> Result<()> {
    let opt = Opt::from_args();

    tracing::subscriber::set_global_default(
        tracing_subscriber::registry()
            .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
            .with(opt.log_level),
    )?;

    opt.thresholds
        .validate()
        .context("invalid detector thresholds")?;

    let input = open_input(opt.input.as_ref()).context("failed opening input")?;

    let rng = match opt.seed {
        Some(seed) => StdRng::seed_from_u64(seed),
        None => StdRng::from_entropy(),
    };
    let mut session = Session::new(opt.thresholds, rng);

    let running = Arc::new(AtomicBool::new(true));
    let running_ctrl_c = running.clone();

    ctrlc::set_handler(move || {
        running_ctrl_c.store(false, Ordering::SeqCst);
    })
    .context("failed setting Ctrl-C handler")?;

    let pb_frames = if opt.show_progress {
        Some(
            ProgressBar::new_spinner().with_style(
                ProgressStyle::default_spinner()
                    .tick_chars("⠁⠂⠄⡀⢀⠠⠐⠈ ")
                    .template("{prefix:.bold.dim} {spinner} {wide_msg}"),
            ),
        )
    } else {
        None
    };

    let (lines_tx, lines_rx) = sync_channel(opt.queue_size);
    let running_read = running.clone();

    // the reader may block on stdin forever, so it is detached rather than joined
    thread::spawn(move || {
        for (i, line) in input.lines().enumerate() {
            if !running_read.load(Ordering::SeqCst) || lines_tx.send((i + 1, line)).is_err() {
                break;
            }
        }
    });

    let served = serve(&mut session, lines_rx, &running, pb_frames.as_ref());

    if let Some(pb_frames) = pb_frames.as_ref() {
        pb_frames.finish_and_clear();
    }

    let report = session.end();
    info!(
        message = "workout summary",
        squat_count = report.squat_count,
        calories = report.calories
    );

    let summary = Response::SessionSummary(report)
        .write_line(std::io::stdout().lock())
        .context("failed writing session summary");

    served.and(summary)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::detector::Thresholds;
    use std::io::Cursor;

    fn session() -> Session<StdRng> {
        Session::new(Thresholds::default(), StdRng::seed_from_u64(5))
    }

    fn respond_all(session: &mut Session<StdRng>, input: &[u8]) -> Vec<Response> {
        Cursor::new(input)
            .lines()
            .enumerate()
            .filter_map(|(i, line)| respond(session, i + 1, line))
            .collect()
    }

    #[test]
    fn blank_lines_get_no_response() {
        let mut session = session();
        assert!(respond_all(&mut session, b"\n   \n").is_empty());
    }

    #[test]
    fn malformed_json_gets_error_response() {
        let mut session = session();
        let responses = respond_all(&mut session, b"{\"type\": \"jump\"}\n{\"type\":\"ping\"}\n");
        assert_eq!(responses.len(), 2);
        assert!(matches!(&responses[0], Response::Error { message } if message.contains("line 1")));
        assert_eq!(responses[1], Response::Pong);
    }

    #[test]
    fn invalid_utf8_line_does_not_end_the_session() {
        let mut session = session();
        let responses = respond_all(
            &mut session,
            b"{\"type\":\"ping\"}\n\xff\xfe\n{\"type\":\"ping\"}\n",
        );
        assert_eq!(responses.len(), 3);
        assert_eq!(responses[0], Response::Pong);
        match &responses[1] {
            Response::Error { message } => {
                assert!(message.contains("failed to read input line 2"), "{}", message);
            }
            other => panic!("unexpected response: {:?}", other),
        }
        assert_eq!(responses[2], Response::Pong);

        let report = session.end();
        assert_eq!(report.squat_count, 0);
    }

    #[test]
    fn serve_stops_when_input_is_exhausted() {
        let mut session = session();
        let (lines_tx, lines_rx) = sync_channel(4);
        lines_tx
            .send((1, Err(io::Error::new(io::ErrorKind::InvalidData, "bad bytes"))))
            .unwrap();
        drop(lines_tx);

        let running = AtomicBool::new(true);
        serve(&mut session, lines_rx, &running, None).unwrap();
        assert_eq!(session.frames_received(), 0);
    }
}
