//! Command-line interface definitions for Comment Harvest.
//!
//! This module defines the CLI arguments and options using the `clap` crate.
//! The API key can be provided via flag or the `NYT_API_KEY` environment variable.

use clap::{Args, Parser, Subcommand};
use comment_harvest::SearchOptions;

/// Command-line arguments for the Comment Harvest application.
///
/// # Examples
///
/// ```sh
/// # Comments for two known articles
/// comment_harvest comments https://www.nytimes.com/2020/01/01/a.html https://www.nytimes.com/2020/01/02/b.html
///
/// # Articles and their comments for January 2018, saved as CSV
/// comment_harvest --save --suffix _Jan2018 dataset --begin-date 20180101 --end-date 20180131
/// ```
#[derive(Parser, Debug)]
#[command(author, version, about)]
pub struct Cli {
    /// New York Times API key (required for `articles` and `dataset`)
    #[arg(long, env = "NYT_API_KEY", global = true)]
    pub api_key: Option<String>,

    /// Optional path to a YAML file overriding endpoints, delays and page sizes
    #[arg(short, long, global = true)]
    pub config: Option<String>,

    /// Only log warnings and errors
    #[arg(short, long, global = true)]
    pub quiet: bool,

    /// Write the datasets as CSV files
    #[arg(short, long, global = true)]
    pub save: bool,

    /// Directory for the CSV files
    #[arg(short, long, default_value = ".", global = true)]
    pub output_dir: String,

    /// Appended to the CSV file names, e.g. `Articles{suffix}.csv`
    #[arg(long, default_value = "", global = true)]
    pub suffix: String,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Collect the comments of the given article URLs
    Comments {
        /// Article URLs
        #[arg(required = true)]
        urls: Vec<String>,

        #[arg(long, default_value_t = 50_000)]
        max_comments: usize,
    },
    /// Search for articles only
    Articles {
        #[command(flatten)]
        search: SearchArgs,

        #[arg(long, default_value_t = 10_000)]
        max_articles: usize,
    },
    /// Search for articles and collect the comments of each
    Dataset {
        #[command(flatten)]
        search: SearchArgs,

        #[arg(long, default_value_t = 100_000)]
        max_comments: usize,

        #[arg(long, default_value_t = 10_000)]
        max_articles: usize,
    },
}

/// Article search options shared by `articles` and `dataset`.
#[derive(Args, Debug, Clone)]
pub struct SearchArgs {
    /// First results page (inclusive)
    #[arg(long, default_value_t = 0, allow_negative_numbers = true)]
    pub page_lower: i32,

    /// Last results page (exclusive)
    #[arg(long, default_value_t = 30, allow_negative_numbers = true)]
    pub page_upper: i32,

    /// Earliest publication date, YYYYMMDD
    #[arg(long)]
    pub begin_date: Option<String>,

    /// Latest publication date, YYYYMMDD
    #[arg(long)]
    pub end_date: Option<String>,

    /// `newest` or `oldest`
    #[arg(long, default_value = "newest")]
    pub sort: String,

    /// Free-text query
    #[arg(long)]
    pub query: Option<String>,

    /// Filter query, e.g. `section_name:("World")`
    #[arg(long)]
    pub filter_query: Option<String>,
}

impl From<SearchArgs> for SearchOptions {
    fn from(a: SearchArgs) -> Self {
        SearchOptions {
            page_lower: a.page_lower,
            page_upper: a.page_upper,
            begin_date: a.begin_date,
            end_date: a.end_date,
            sort: a.sort,
            query: a.query,
            filter_query: a.filter_query,
        }
    }
}
