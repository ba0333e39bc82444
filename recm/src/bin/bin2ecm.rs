use anyhow::{anyhow, bail, Result};
use clap::Parser;
use ecm::{EcmError, Encoder, State};
use recm::{check_overwrite, default_encoded_name, MAX_STEP_IN_BYTES};
use std::fs::File;
use std::io::{self, BufReader, BufWriter, Write};
use std::path::PathBuf;
use thousands::Separable;

/// Encode a CD image into an ECM file.
#[derive(Parser)]
#[command(version, about, long_about = None)]
struct Cli {
    /// Input CD image
    #[arg(required_unless_present = "stdin")]
    input: Option<PathBuf>,

    /// Output ECM file; defaults to the input name with ".ecm" appended
    output: Option<PathBuf>,

    /// Read the image from standard input
    #[arg(long, conflicts_with = "input")]
    stdin: bool,

    /// Write the encoded stream to standard output
    #[arg(long, conflicts_with = "output")]
    stdout: bool,
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    if cli.stdin {
        // the encoder seeks its input to restart runs, a pipe cannot do that
        bail!("{}", EcmError::StdinNotSupported.as_str());
    }
    let input = cli
        .input
        .ok_or_else(|| anyhow!("no input file given"))?;

    let source = BufReader::new(
        File::open(&input).map_err(|_| anyhow!("{}", EcmError::ErrorOpeningInputFile.as_str()))?,
    );

    let output = if cli.stdout {
        None
    } else {
        Some(cli.output.unwrap_or_else(|| default_encoded_name(&input)))
    };
    let sink: Box<dyn Write> = match &output {
        Some(path) => {
            check_overwrite(path)?;
            let file = File::create(path)
                .map_err(|_| anyhow!("{}", EcmError::ErrorOpeningOutputFile.as_str()))?;
            Box::new(BufWriter::new(file))
        }
        None => Box::new(io::stdout()),
    };

    match &output {
        Some(path) => println!("Encoding {} to {}...", input.display(), path.display()),
        None => eprintln!("Encoding {} to stdout...", input.display()),
    }

    let mut encoder = Encoder::new(source, sink, MAX_STEP_IN_BYTES)
        .map_err(|e| anyhow!("{}", e.as_str()))?;

    let mut last = (u32::MAX, u32::MAX);
    loop {
        let progress = encoder.step();
        let shown = (progress.analyze_percentage, progress.codec_percentage);
        if shown != last {
            eprint!("Analyze({:02}%) Encode({:02}%)\r", shown.0, shown.1);
            last = shown;
        }
        if progress.state != State::InProgress {
            break;
        }
    }
    eprintln!();

    let progress = encoder.progress().clone();
    if let Some(reason) = progress.failure {
        bail!("{}", reason.as_str());
    }

    // the report goes to stderr when the encoded stream owns stdout
    let say = |line: String| {
        if cli.stdout {
            eprintln!("{line}");
        } else {
            println!("{line}");
        }
    };
    say(format!(
        "Literal bytes........... {}",
        progress.literal_bytes.separate_with_commas()
    ));
    say(format!(
        "Mode 1 sectors.......... {}",
        progress.mode_1_sectors.separate_with_commas()
    ));
    say(format!(
        "Mode 2 form 1 sectors... {}",
        progress.mode_2_form_1_sectors.separate_with_commas()
    ));
    say(format!(
        "Mode 2 form 2 sectors... {}",
        progress.mode_2_form_2_sectors.separate_with_commas()
    ));
    say(format!(
        "Encoded {} bytes -> {} bytes",
        progress.bytes_before_processing.separate_with_commas(),
        progress.bytes_after_processing.separate_with_commas()
    ));
    say("Done".to_string());

    Ok(())
}
