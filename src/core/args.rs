use std::path::PathBuf;

use clap::{Parser, Subcommand, ValueEnum};

use crate::io::column::StringEncoding;

#[derive(Parser, Debug, PartialEq)]
#[command(version, about)]
pub struct CliArgs {
    #[arg(short, long)]
    pub config: Option<String>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug, PartialEq)]
pub enum Command {
    /// Store every line of a text file as one element of a string column.
    /// A line reading `NA` is stored as a missing value.
    Write {
        #[arg(short, long)]
        input: PathBuf,
        #[arg(short, long)]
        output: PathBuf,
        /// Compression level 0-100, overrides the config file.
        #[arg(long)]
        compression: Option<u32>,
        #[arg(long, value_enum, default_value_t = EncodingArg::Utf8)]
        encoding: EncodingArg,
    },
    /// Print a row range of a string column file.
    Read {
        #[arg(short, long)]
        input: PathBuf,
        /// Total number of rows stored in the column.
        #[arg(long)]
        rows: u64,
        #[arg(long, default_value_t = 0)]
        start: u64,
        #[arg(long)]
        count: Option<u64>,
    },
}

#[derive(ValueEnum, Clone, Copy, Debug, PartialEq)]
pub enum EncodingArg {
    Native,
    Latin1,
    Utf8,
}

impl From<EncodingArg> for StringEncoding {
    fn from(arg: EncodingArg) -> Self {
        match arg {
            EncodingArg::Native => StringEncoding::Native,
            EncodingArg::Latin1 => StringEncoding::Latin1,
            EncodingArg::Utf8 => StringEncoding::Utf8,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_args_parsing_write() {
        let args = CliArgs::parse_from([
            "self",
            "--config",
            "foo",
            "write",
            "--input",
            "in.txt",
            "--output",
            "out.col",
            "--compression",
            "70",
        ]);
        assert_eq!(
            args,
            CliArgs {
                config: Some("foo".to_string()),
                command: Command::Write {
                    input: PathBuf::from("in.txt"),
                    output: PathBuf::from("out.col"),
                    compression: Some(70),
                    encoding: EncodingArg::Utf8,
                },
            }
        );
    }

    #[test]
    fn test_args_parsing_read() {
        let args = CliArgs::parse_from(["self", "read", "-i", "col", "--rows", "10", "--start", "3"]);
        assert_eq!(
            args.command,
            Command::Read {
                input: PathBuf::from("col"),
                rows: 10,
                start: 3,
                count: None,
            }
        );
        assert_eq!(args.config, None);
    }
}
