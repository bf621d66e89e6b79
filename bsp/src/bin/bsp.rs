use std::path::{Path, PathBuf};
use std::time::Instant;

use bsp::matrix_market::MatrixMarketHeader;
use bsp::{
    BinsparseError, CooMatrix, CscMatrix, CsrMatrix, DataType, DenseMatrix, DuplicatePolicy,
    Element, ErrorCategory, FlatFileReader, ImportOptions, Index, WriteOptions,
};
use clap::{Args, Parser, Subcommand, ValueEnum};

type CliResult<T> = Result<T, Box<dyn std::error::Error>>;

#[derive(Parser)]
#[command(author, version, long_about = None)]
#[command(about = "bsp - inspect binsparse files and convert matrix market input")]
struct Cli {
    /// Log per-operation detail to stderr
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Print the metadata document of a binsparse file
    Inspect {
        /// Binsparse flat file
        file: PathBuf,
    },
    /// List the datasets stored in a binsparse file
    Datasets {
        /// Binsparse flat file
        file: PathBuf,
    },
    /// Convert a matrix market file to binsparse
    Import(ImportArgs),
}

#[derive(Args)]
struct ImportArgs {
    /// Matrix market input (.mtx)
    input: PathBuf,

    /// Binsparse output, overwritten if present
    output: PathBuf,

    #[arg(long, value_enum, default_value_t = TargetFormat::Csr)]
    format: TargetFormat,

    /// Value type label, e.g. float64 or int32
    #[arg(long, default_value = "float64", value_parser = parse_data_type)]
    value_type: DataType,

    /// Index type label for sparse formats, e.g. uint32
    #[arg(long, default_value = "uint64", value_parser = parse_data_type)]
    index_type: DataType,

    /// Requested compression level, 0 to 9
    #[arg(long, default_value_t = 9)]
    compression: u8,

    /// Keep only the stored triangle of symmetric input
    #[arg(long)]
    no_expand: bool,

    /// Keep the last of repeated entries instead of summing them
    #[arg(long)]
    keep_last: bool,

    /// Store pattern input as iso
    #[arg(long)]
    iso_pattern: bool,
}

#[derive(Clone, Copy, ValueEnum)]
enum TargetFormat {
    Csr,
    Csc,
    Coo,
    Dense,
}

fn parse_data_type(label: &str) -> Result<DataType, String> {
    DataType::from_label(label).map_err(|e| e.to_string())
}

/// Run `$body` with `$T` bound to the Rust type of a value label
macro_rules! with_value_type {
    ($data_type:expr, $T:ident => $body:expr) => {
        match $data_type {
            DataType::Int8 => { type $T = i8; $body }
            DataType::Int16 => { type $T = i16; $body }
            DataType::Int32 => { type $T = i32; $body }
            DataType::Int64 => { type $T = i64; $body }
            DataType::UInt8 => { type $T = u8; $body }
            DataType::UInt16 => { type $T = u16; $body }
            DataType::UInt32 => { type $T = u32; $body }
            DataType::UInt64 => { type $T = u64; $body }
            DataType::Float32 => { type $T = f32; $body }
            DataType::Float64 => { type $T = f64; $body }
        }
    };
}

/// Same as `with_value_type!` for integer labels only
macro_rules! with_index_type {
    ($data_type:expr, $I:ident => $body:expr) => {
        match $data_type {
            DataType::Int8 => { type $I = i8; $body }
            DataType::Int16 => { type $I = i16; $body }
            DataType::Int32 => { type $I = i32; $body }
            DataType::Int64 => { type $I = i64; $body }
            DataType::UInt8 => { type $I = u8; $body }
            DataType::UInt16 => { type $I = u16; $body }
            DataType::UInt32 => { type $I = u32; $body }
            DataType::UInt64 => { type $I = u64; $body }
            other => Err(format!("{other} cannot be used as an index type").into()),
        }
    };
}

fn main() {
    let cli = Cli::parse();
    let level = if cli.verbose {
        tracing::Level::DEBUG
    } else {
        tracing::Level::WARN
    };
    tracing_subscriber::fmt()
        .with_max_level(level)
        .with_writer(std::io::stderr)
        .init();

    if let Err(e) = run(&cli.command) {
        eprintln!("error: {e}");
        std::process::exit(exit_code(e.as_ref()));
    }
}

/// 2 for caller mistakes, 3 for bad files, 4 for storage failures
fn exit_code(error: &(dyn std::error::Error + 'static)) -> i32 {
    match error.downcast_ref::<BinsparseError>().map(BinsparseError::category) {
        Some(ErrorCategory::Usage) => 2,
        Some(ErrorCategory::Format | ErrorCategory::Content) => 3,
        Some(ErrorCategory::Storage) => 4,
        None => 1,
    }
}

fn run(command: &Commands) -> CliResult<()> {
    match command {
        Commands::Inspect { file } => {
            let document = bsp::inspect(file)?;
            println!("{}", document.to_json_string()?);
        }
        Commands::Datasets { file } => list_datasets(file)?,
        Commands::Import(args) => {
            let start_time = Instant::now();
            let header = match args.format {
                TargetFormat::Dense => {
                    with_value_type!(args.value_type, T => import_dense::<T>(args))
                }
                format => with_value_type!(args.value_type, T => {
                    with_index_type!(args.index_type, I => import_sparse::<T, I>(args, format))
                }),
            }?;
            println!(
                "imported {}x{} matrix, {} stored values, in {:.2?}",
                header.nrows,
                header.ncols,
                header.stored_entries,
                start_time.elapsed()
            );
        }
    }
    Ok(())
}

fn list_datasets(file: &Path) -> CliResult<()> {
    let reader = FlatFileReader::open(file)?;
    println!("{:<16} {:<10} {:>12} {:>6}", "name", "type", "length", "level");
    for dataset in reader.datasets() {
        println!(
            "{:<16} {:<10} {:>12} {:>6}",
            dataset.name, dataset.data_type, dataset.len, dataset.compression_level
        );
    }
    for (name, _) in reader.attributes() {
        println!("attribute {name}");
    }
    Ok(())
}

fn options(args: &ImportArgs) -> (ImportOptions, WriteOptions) {
    let duplicates = if args.keep_last {
        DuplicatePolicy::KeepLast
    } else {
        DuplicatePolicy::Sum
    };
    let import = ImportOptions::default()
        .with_duplicates(duplicates)
        .with_expand_symmetry(!args.no_expand)
        .with_iso_pattern(args.iso_pattern);
    let write = WriteOptions::default().with_compression_level(args.compression);
    (import, write)
}

fn import_sparse<T: Element, I: Index>(
    args: &ImportArgs,
    format: TargetFormat,
) -> CliResult<MatrixMarketHeader> {
    let (import, write) = options(args);
    let header = match format {
        TargetFormat::Csr => {
            let mut matrix = CsrMatrix::<T, I>::new();
            let header = bsp::read_matrix_market(&args.input, &import, &mut matrix)?;
            bsp::write_csr_file(&args.output, &matrix.view(), &write)?;
            header
        }
        TargetFormat::Csc => {
            let mut matrix = CscMatrix::<T, I>::new();
            let header = bsp::read_matrix_market(&args.input, &import, &mut matrix)?;
            bsp::write_csc_file(&args.output, &matrix.view(), &write)?;
            header
        }
        TargetFormat::Coo => {
            let mut matrix = CooMatrix::<T, I>::new();
            let header = bsp::read_matrix_market(&args.input, &import, &mut matrix)?;
            bsp::write_coo_file(&args.output, &matrix.view(), &write)?;
            header
        }
        TargetFormat::Dense => import_dense::<T>(args)?,
    };
    Ok(header)
}

fn import_dense<T: Element>(args: &ImportArgs) -> CliResult<MatrixMarketHeader> {
    let (import, write) = options(args);
    let mut matrix = DenseMatrix::<T>::new();
    let header = bsp::read_matrix_market(&args.input, &import, &mut matrix)?;
    bsp::write_dense_file(&args.output, &matrix.view(), &write)?;
    Ok(header)
}
