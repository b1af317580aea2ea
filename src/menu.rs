use argp::FromArgs;

/// Top-level command
#[derive(FromArgs, PartialEq, Debug)]
#[argp(description = "Inspect, verify and re-encode OpenCTM triangle mesh files.")]
pub struct CtmTool {
    #[argp(option, short = 'v', global, default = "0")]
    #[argp(
        description = "Logging level (0 = Off, 1 = Error, 2 = Warn, 3 = Info, 4 = Debug, 5 = Trace)"
    )]
    pub verbose: usize,

    #[argp(subcommand)]
    pub nested: Commands,
}

/// All operations the tool supports.
#[derive(FromArgs, PartialEq, Debug)]
#[argp(subcommand)]
#[non_exhaustive]
pub enum Commands {
    Info(InfoData),
    Convert(ConvertData),
    Verify(VerifyData),
}

/// Command to print the header of a file without decoding its body.
#[derive(FromArgs, PartialEq, Debug)]
#[argp(subcommand, name = "info")]
#[argp(description = "Print the header information of an OpenCTM file")]
pub struct InfoData {
    #[argp(positional)]
    #[argp(description = "Input file to be inspected")]
    pub input: String,
}

/// Command to decode a file and write it back with different parameters.
#[derive(FromArgs, PartialEq, Debug)]
#[argp(subcommand, name = "convert")]
#[argp(description = "Re-encode an OpenCTM file with a different method or precision")]
pub struct ConvertData {
    #[argp(option, short = 'm')]
    #[argp(description = "Compression method: raw, mg1 or mg2 (default mg1)")]
    pub method: Option<String>,

    #[argp(option, short = 'l')]
    #[argp(description = "Compression level, 0-9 (default 1)")]
    pub level: Option<u32>,

    #[argp(option)]
    #[argp(description = "MG2 vertex coordinate precision")]
    pub vertex_precision: Option<f32>,

    #[argp(option)]
    #[argp(description = "MG2 normal precision")]
    pub normal_precision: Option<f32>,

    #[argp(option)]
    #[argp(description = "Replace the file comment")]
    pub comment: Option<String>,

    #[argp(positional)]
    #[argp(description = "Input file to be converted")]
    pub input: String,

    #[argp(positional)]
    #[argp(description = "Output file to write to")]
    pub output: String,
}

/// Command to fully decode a file and report whether the mesh holds up.
#[derive(FromArgs, PartialEq, Debug)]
#[argp(subcommand, name = "verify")]
#[argp(description = "Decode an OpenCTM file and check the mesh integrity")]
pub struct VerifyData {
    #[argp(positional)]
    #[argp(description = "Input file to be checked")]
    pub input: String,
}
