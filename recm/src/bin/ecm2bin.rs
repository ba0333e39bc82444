use anyhow::{anyhow, bail, Result};
use clap::Parser;
use ecm::{Decoder, EcmError, State};
use recm::{check_overwrite, default_decoded_name, MAX_STEP_IN_BYTES};
use std::fs::File;
use std::io::{self, BufReader, BufWriter, Read, Write};
use std::path::PathBuf;
use thousands::Separable;

/// Decode an ECM file back into the original CD image.
#[derive(Parser)]
#[command(version, about, long_about = None)]
struct Cli {
    /// Input ECM file
    #[arg(required_unless_present = "stdin")]
    input: Option<PathBuf>,

    /// Output image file; defaults to the input name without its ".ecm"
    /// suffix, or with ".unecm" appended when there is none
    output: Option<PathBuf>,

    /// Read the encoded stream from standard input
    #[arg(long, conflicts_with = "input")]
    stdin: bool,

    /// Write the decoded image to standard output
    #[arg(long, conflicts_with = "output")]
    stdout: bool,
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let (source, input_len, input_label): (Box<dyn Read>, Option<u64>, String) = if cli.stdin {
        (Box::new(io::stdin()), None, "stdin".to_string())
    } else {
        let path = cli
            .input
            .clone()
            .ok_or_else(|| anyhow!("no input file given"))?;
        let file = File::open(&path)
            .map_err(|_| anyhow!("{}", EcmError::ErrorOpeningInputFile.as_str()))?;
        let len = file.metadata().ok().map(|m| m.len());
        (
            Box::new(BufReader::new(file)),
            len,
            path.display().to_string(),
        )
    };

    let output = if cli.stdout {
        None
    } else {
        match (cli.output, &cli.input) {
            (Some(path), _) => Some(path),
            (None, Some(input)) => Some(default_decoded_name(input)),
            (None, None) => bail!("no output file given"),
        }
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
        Some(path) => println!("Decoding {} to {}...", input_label, path.display()),
        None => eprintln!("Decoding {} to stdout...", input_label),
    }

    let mut decoder = Decoder::new(source, sink, MAX_STEP_IN_BYTES, input_len)
        .map_err(|e| anyhow!("{}", e.as_str()))?;

    let mut last = u32::MAX;
    loop {
        let progress = decoder.step();
        if progress.codec_percentage != last {
            eprint!("Decode({:02}%)\r", progress.codec_percentage);
            last = progress.codec_percentage;
        }
        if progress.state != State::InProgress {
            break;
        }
    }
    eprintln!();

    let progress = decoder.progress().clone();
    if let Some(reason) = progress.failure {
        bail!("{}", reason.as_str());
    }

    let say = |line: String| {
        if cli.stdout {
            eprintln!("{line}");
        } else {
            println!("{line}");
        }
    };
    say(format!(
        "Decoded {} bytes -> {} bytes",
        progress.bytes_before_processing.separate_with_commas(),
        progress.bytes_after_processing.separate_with_commas()
    ));
    say("Done".to_string());

    Ok(())
}
