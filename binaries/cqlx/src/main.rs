use {
    clap::{arg, ArgMatches, Command},
    cmd::Error as ExecutionError,
    exporter::ExportOptions,
    snafu::prelude::*,
    std::{
        env, io,
        path::{Path, PathBuf},
        process,
    },
    tracing_subscriber::EnvFilter,
};

mod cmd;

#[derive(Debug, Snafu)]
pub enum Error {
    #[snafu(display(
        "the `CQLX_STORAGE_DIR` environment variable is unset, \
         you can pass an argument with `-d` to config"
    ))]
    NoStorageDirectory,

    ExecuteCommand {
        #[snafu(backtrace)]
        source: ExecutionError,
    },
}

pub type Result<T> = std::result::Result<T, Error>;

const CQLX_STORAGE_DIR: &str = "CQLX_STORAGE_DIR";

const EXPORT: &str = "export";
const CAT: &str = "cat";

fn cli() -> Command {
    let pkg_name = env!("CARGO_PKG_NAME");

    Command::new(pkg_name)
        .bin_name(pkg_name)
        .about(env!("CARGO_PKG_DESCRIPTION"))
        .subcommand_required(true)
        .subcommand(
            Command::new(EXPORT)
                .about("export the rows of a captured RESULT body")
                .arg(
                    arg!(<BODY_FILE> "RESULT message body, as received")
                        .value_parser(clap::value_parser!(PathBuf)),
                )
                .arg(arg!(--"fetch-one" "export the first row only"))
                .arg(arg!(--store "stream every row into a record file"))
                .arg(arg!(--fetch "collect every row in memory"))
                .arg(
                    arg!(-d --"storage-dir" <PATH> "storage directory")
                        .value_parser(clap::value_parser!(PathBuf)),
                ),
        )
        .subcommand(
            Command::new(CAT)
                .about("print the records of a record file")
                .arg(arg!(<RECORD_FILE> "record file").value_parser(clap::value_parser!(PathBuf))),
        )
}

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(io::stderr)
        .init();

    if let Err(err) = try_main() {
        eprintln!("{}", err);
        process::exit(2);
    }
}

fn try_main() -> Result<()> {
    let matches = cli().get_matches();
    let mut stdout = io::stdout().lock();

    match matches.subcommand() {
        Some((EXPORT, sub_matches)) => {
            let storage_dir = storage_dir(sub_matches)?;
            let options = ExportOptions {
                fetch_one: sub_matches.get_flag("fetch-one"),
                store: sub_matches.get_flag("store"),
                fetch: sub_matches.get_flag("fetch"),
            };

            cmd::export(path_arg(sub_matches, "BODY_FILE"), &storage_dir, &options, &mut stdout)
                .context(ExecuteCommandSnafu)?;
        }
        Some((CAT, sub_matches)) => {
            cmd::cat(path_arg(sub_matches, "RECORD_FILE"), &mut stdout)
                .context(ExecuteCommandSnafu)?;
        }
        _ => unreachable!(),
    }

    Ok(())
}

fn path_arg<'a>(matches: &'a ArgMatches, id: &str) -> &'a Path {
    matches
        .get_one::<PathBuf>(id)
        .map(PathBuf::as_path)
        .unwrap_or_else(|| unreachable!("clap enforces required arguments"))
}

fn storage_dir(matches: &ArgMatches) -> Result<PathBuf> {
    match matches.get_one::<PathBuf>("storage-dir") {
        Some(dir) => Ok(dir.clone()),
        None => env::var_os(CQLX_STORAGE_DIR)
            .map(PathBuf::from)
            .context(NoStorageDirectorySnafu),
    }
}
