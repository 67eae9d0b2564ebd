use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(name = "muni")]
#[command(about = "Muni Docs - upload, browse and search municipal documents")]
#[command(version)]
pub struct Cli {
    /// Backend base URL (overrides the saved setting)
    #[arg(long, global = true, env = "MUNI_API_BASE_URL", value_name = "URL")]
    pub api_base_url: Option<String>,

    /// Directory holding the local database
    #[arg(long, global = true, env = "MUNI_DATA_DIR", value_name = "DIR")]
    pub data_dir: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Create an account and sign in
    Signup(Credentials),

    /// Sign in with an existing account
    Signin(Credentials),

    /// Forget the stored session
    Logout,

    /// Show the backend and session state
    Status,

    /// Work with uploaded documents
    #[command(alias = "docs")]
    Documents {
        #[command(subcommand)]
        action: DocumentsAction,
    },

    /// Ask a question answered from the uploaded documents
    Search {
        /// Question in natural language
        #[arg(required = true, num_args = 1..)]
        query: Vec<String>,
    },

    /// Inspect or change the saved configuration
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },
}

#[derive(Args, Debug)]
pub struct Credentials {
    #[arg(long, short)]
    pub email: String,

    #[arg(long, short, env = "MUNI_PASSWORD", hide_env_values = true)]
    pub password: String,
}

#[derive(Subcommand, Debug)]
pub enum DocumentsAction {
    /// List documents
    #[command(alias = "ls")]
    List {
        /// Free-text filter applied by the backend
        #[arg(long, short)]
        query: Option<String>,
        /// pendiente, listo, error or todos
        #[arg(long, short)]
        status: Option<String>,
        /// Backend sort key
        #[arg(long)]
        sort: Option<String>,
    },

    /// Upload a PDF, TXT, DOC or DOCX file (10 MiB max)
    Upload { path: PathBuf },

    /// Print a document's public URL
    Url { id: String },

    /// Generate a summary of a document
    Summarize { id: String },
}

#[derive(Subcommand, Debug)]
pub enum ConfigAction {
    /// Save the backend base URL for later runs
    SetBaseUrl { url: String },

    /// Print the effective configuration
    Show,
}
