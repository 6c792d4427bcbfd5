use std::fs::File;
use std::io::{BufRead, BufReader, BufWriter, Write};

use anyhow::{Context, Result};
use clap::Parser;
use log::info;

use blockcol::conf::Config;
use blockcol::core::{CliArgs, Command, setup_logging};
use blockcol::{StringColumnReader, StringColumnWriter};

fn main() -> Result<()> {
    setup_logging();
    let args = CliArgs::parse();
    info!("Blockcol started.");

    let config = match &args.config {
        Some(path) => Config::from_file(path)?,
        None => Config::default(),
    };

    match args.command {
        Command::Write {
            input,
            output,
            compression,
            encoding,
        } => {
            let lines = BufReader::new(
                File::open(&input).with_context(|| format!("cannot open {}", input.display()))?,
            );
            let mut values = Vec::new();
            for line in lines.lines() {
                let line = line?;
                values.push(if line == "NA" { None } else { Some(line) });
            }

            let mut out = BufWriter::new(
                File::create(&output)
                    .with_context(|| format!("cannot create {}", output.display()))?,
            );
            let compression = compression.unwrap_or(config.codec.compression);
            StringColumnWriter::new(&config.codec).write(
                &mut out,
                &values,
                compression,
                encoding.into(),
            )?;
            out.flush()?;
            info!(
                "Wrote {} rows to {} at compression {}",
                values.len(),
                output.display(),
                compression
            );
        }
        Command::Read {
            input,
            rows,
            start,
            count,
        } => {
            let mut file = BufReader::new(
                File::open(&input).with_context(|| format!("cannot open {}", input.display()))?,
            );
            let count = count.unwrap_or(rows.saturating_sub(start));
            let values =
                StringColumnReader::new(&config.codec).read(&mut file, 0, start, count, rows)?;

            let stdout = std::io::stdout();
            let mut out = BufWriter::new(stdout.lock());
            for value in values {
                match value {
                    Some(value) => writeln!(out, "{value}")?,
                    None => writeln!(out, "NA")?,
                }
            }
            out.flush()?;
        }
    }
    Ok(())
}
