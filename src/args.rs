//! These structs provide the CLI interface for the fintrack CLI.

use crate::model::{Amount, CategoryId, Kind, TransactionId};
use crate::report::YearMonth;
use chrono::NaiveDate;
use clap::{Parser, Subcommand, ValueEnum};
use serde::{Deserialize, Serialize};
use std::convert::Infallible;
use std::fmt::{Display, Formatter};
use std::ops::Deref;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use tracing::error;
use tracing::level_filters::LevelFilter;

/// fintrack: A command-line tool for tracking personal income and expenses.
///
/// Transactions and categories are stored as JSON files in a local directory. Reports summarize a
/// month or a year. Optionally, every change can be pushed to a spreadsheet through a webhook URL
/// (for example an Apps Script deployment), and the spreadsheet's data can be pulled back down.
#[derive(Debug, Parser, Clone)]
pub struct Args {
    #[clap(flatten)]
    common: Common,

    #[command(subcommand)]
    command: Command,
}

impl Args {
    pub fn new(common: Common, command: Command) -> Self {
        Self { common, command }
    }

    pub fn common(&self) -> &Common {
        &self.common
    }

    pub fn command(&self) -> &Command {
        &self.command
    }
}

#[derive(Subcommand, Debug, Clone)]
pub enum Command {
    /// Create the data directory and initialize the configuration file.
    ///
    /// This is the first command you should run. By default the data directory is
    /// $HOME/fintrack; pass --home or set FINTRACK_HOME to put it somewhere else.
    Init,
    /// Set or show the webhook endpoint used for sync.
    Remote(RemoteArgs),
    /// Add, edit, delete or list transactions.
    Tx(TxArgs),
    /// Add, delete or list categories.
    Category(CategoryArgs),
    /// Summaries of a month or a year.
    Report(ReportArgs),
    /// Write all data to a JSON backup file, or to CSV files.
    Export(ExportArgs),
    /// Load data from a JSON backup file written by export.
    Import(ImportArgs),
    /// Delete all transactions and restore the built-in categories.
    Clear(ConfirmArgs),
    /// Push data to, or pull data from, the remote spreadsheet.
    Sync(SyncArgs),
}

/// Arguments common to all subcommands.
#[derive(Debug, Parser, Clone)]
pub struct Common {
    /// The logging verbosity. One of, from least to most verbose:
    /// off, error, warn, info, debug, trace
    ///
    /// This can be overridden by RUST_LOG. See the tracing-subscriber crate for instructions.
    #[arg(long, default_value_t = LevelFilter::INFO)]
    log_level: LevelFilter,

    /// The directory where fintrack data and configuration is held. Defaults to ~/fintrack
    #[arg(long, env = "FINTRACK_HOME", default_value_t = default_fintrack_home())]
    home: DisplayPath,
}

impl Common {
    pub fn new(log_level: LevelFilter, home: PathBuf) -> Self {
        Self {
            log_level,
            home: home.into(),
        }
    }

    pub fn log_level(&self) -> LevelFilter {
        self.log_level
    }

    pub fn home(&self) -> &DisplayPath {
        &self.home
    }
}

/// A category given on the command line, either by id or by name.
#[derive(Debug, Clone, Eq, PartialEq)]
pub enum CategoryRef {
    Id(CategoryId),
    Name(String),
}

impl FromStr for CategoryRef {
    type Err = Infallible;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(match s.trim().parse::<i64>() {
            Ok(id) => CategoryRef::Id(CategoryId::new(id)),
            Err(_) => CategoryRef::Name(s.trim().to_string()),
        })
    }
}

impl Display for CategoryRef {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            CategoryRef::Id(id) => write!(f, "{id}"),
            CategoryRef::Name(name) => write!(f, "'{name}'"),
        }
    }
}

/// (Not shown): Args for the `fintrack remote` command.
#[derive(Debug, Parser, Clone)]
pub struct RemoteArgs {
    #[command(subcommand)]
    action: RemoteSubcommand,
}

impl RemoteArgs {
    pub fn new(action: RemoteSubcommand) -> Self {
        Self { action }
    }

    pub fn action(&self) -> &RemoteSubcommand {
        &self.action
    }
}

#[derive(Subcommand, Debug, Clone)]
pub enum RemoteSubcommand {
    /// Save the webhook endpoint and spreadsheet details.
    Set(RemoteSetArgs),
    /// Show the saved endpoint and when the last successful push happened.
    Show,
}

/// (Not shown): Args for the `fintrack remote set` command.
#[derive(Debug, Parser, Clone)]
pub struct RemoteSetArgs {
    /// The webhook URL that receives pushes and answers pulls, e.g.
    /// https://script.google.com/macros/s/AKfycb.../exec
    #[arg(long)]
    webhook_url: String,

    /// The URL of the spreadsheet. Only its id is saved.
    #[arg(long)]
    sheet_url: Option<String>,

    #[arg(long, default_value = "")]
    api_key: String,

    #[arg(long, default_value = "")]
    client_id: String,
}

impl RemoteSetArgs {
    pub fn new(webhook_url: impl Into<String>, sheet_url: Option<String>) -> Self {
        Self {
            webhook_url: webhook_url.into(),
            sheet_url,
            api_key: String::new(),
            client_id: String::new(),
        }
    }

    pub fn webhook_url(&self) -> &str {
        &self.webhook_url
    }

    pub fn sheet_url(&self) -> Option<&str> {
        self.sheet_url.as_deref()
    }

    pub fn api_key(&self) -> &str {
        &self.api_key
    }

    pub fn client_id(&self) -> &str {
        &self.client_id
    }
}

/// (Not shown): Args for the `fintrack tx` command.
#[derive(Debug, Parser, Clone)]
pub struct TxArgs {
    #[command(subcommand)]
    action: TxSubcommand,
}

impl TxArgs {
    pub fn new(action: TxSubcommand) -> Self {
        Self { action }
    }

    pub fn action(&self) -> &TxSubcommand {
        &self.action
    }
}

#[derive(Subcommand, Debug, Clone)]
pub enum TxSubcommand {
    /// Record a new transaction.
    Add(TxAddArgs),
    /// Change an existing transaction. Fields that are not given keep their current value.
    Edit(TxEditArgs),
    /// Delete a transaction.
    Delete(TxDeleteArgs),
    /// List transactions, newest first.
    List(TxListArgs),
}

/// (Not shown): Args for the `fintrack tx add` command.
#[derive(Debug, Parser, Clone)]
pub struct TxAddArgs {
    /// income or expense
    #[arg(long = "type")]
    kind: Kind,

    #[arg(long)]
    description: String,

    /// A positive amount, e.g. 12.50 or $1,200
    #[arg(long)]
    amount: Amount,

    /// YYYY-MM-DD. Defaults to today.
    #[arg(long)]
    date: Option<NaiveDate>,

    /// The category id or name. It must belong to the group matching --type.
    #[arg(long)]
    category: CategoryRef,

    #[arg(long, default_value = "")]
    notes: String,
}

impl TxAddArgs {
    pub fn new(
        kind: Kind,
        description: impl Into<String>,
        amount: Amount,
        date: Option<NaiveDate>,
        category: CategoryRef,
    ) -> Self {
        Self {
            kind,
            description: description.into(),
            amount,
            date,
            category,
            notes: String::new(),
        }
    }

    pub fn kind(&self) -> Kind {
        self.kind
    }

    pub fn description(&self) -> &str {
        &self.description
    }

    pub fn amount(&self) -> Amount {
        self.amount
    }

    pub fn date(&self) -> Option<NaiveDate> {
        self.date
    }

    pub fn category(&self) -> &CategoryRef {
        &self.category
    }

    pub fn notes(&self) -> &str {
        &self.notes
    }
}

/// (Not shown): Args for the `fintrack tx edit` command.
#[derive(Debug, Default, Parser, Clone)]
pub struct TxEditArgs {
    /// The id of the transaction to change.
    id: TransactionId,

    #[arg(long = "type")]
    kind: Option<Kind>,

    #[arg(long)]
    description: Option<String>,

    #[arg(long)]
    amount: Option<Amount>,

    #[arg(long)]
    date: Option<NaiveDate>,

    #[arg(long)]
    category: Option<CategoryRef>,

    #[arg(long)]
    notes: Option<String>,
}

impl TxEditArgs {
    pub fn new(id: TransactionId) -> Self {
        Self {
            id,
            ..Default::default()
        }
    }

    pub fn with_amount(mut self, amount: Amount) -> Self {
        self.amount = Some(amount);
        self
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    pub fn id(&self) -> TransactionId {
        self.id
    }

    pub fn kind(&self) -> Option<Kind> {
        self.kind
    }

    pub fn description(&self) -> Option<&str> {
        self.description.as_deref()
    }

    pub fn amount(&self) -> Option<Amount> {
        self.amount
    }

    pub fn date(&self) -> Option<NaiveDate> {
        self.date
    }

    pub fn category(&self) -> Option<&CategoryRef> {
        self.category.as_ref()
    }

    pub fn notes(&self) -> Option<&str> {
        self.notes.as_deref()
    }
}

/// (Not shown): Args for the `fintrack tx delete` command.
#[derive(Debug, Parser, Clone)]
pub struct TxDeleteArgs {
    /// The id of the transaction to delete.
    id: TransactionId,
}

impl TxDeleteArgs {
    pub fn new(id: TransactionId) -> Self {
        Self { id }
    }

    pub fn id(&self) -> TransactionId {
        self.id
    }
}

/// (Not shown): Args for the `fintrack tx list` command.
#[derive(Debug, Default, Parser, Clone)]
pub struct TxListArgs {
    /// Only transactions in this month, YYYY-MM.
    #[arg(long)]
    month: Option<YearMonth>,

    /// Only income or only expense.
    #[arg(long = "type")]
    kind: Option<Kind>,

    /// Only transactions in this category (id or name).
    #[arg(long)]
    category: Option<CategoryRef>,

    /// Only transactions whose description contains this text, ignoring case.
    #[arg(long)]
    search: Option<String>,

    /// Show at most this many transactions.
    #[arg(long)]
    limit: Option<usize>,
}

impl TxListArgs {
    pub fn new(month: Option<YearMonth>, kind: Option<Kind>) -> Self {
        Self {
            month,
            kind,
            ..Default::default()
        }
    }

    pub fn with_search(mut self, search: impl Into<String>) -> Self {
        self.search = Some(search.into());
        self
    }

    pub fn month(&self) -> Option<YearMonth> {
        self.month
    }

    pub fn kind(&self) -> Option<Kind> {
        self.kind
    }

    pub fn category(&self) -> Option<&CategoryRef> {
        self.category.as_ref()
    }

    pub fn search(&self) -> Option<&str> {
        self.search.as_deref()
    }

    pub fn limit(&self) -> Option<usize> {
        self.limit
    }
}

/// (Not shown): Args for the `fintrack category` command.
#[derive(Debug, Parser, Clone)]
pub struct CategoryArgs {
    #[command(subcommand)]
    action: CategorySubcommand,
}

impl CategoryArgs {
    pub fn new(action: CategorySubcommand) -> Self {
        Self { action }
    }

    pub fn action(&self) -> &CategorySubcommand {
        &self.action
    }
}

#[derive(Subcommand, Debug, Clone)]
pub enum CategorySubcommand {
    /// Create a category in the income or expense group.
    Add(CategoryAddArgs),
    /// Delete a category. Categories that are used by a transaction cannot be deleted.
    Delete(CategoryDeleteArgs),
    /// List the categories of one or both groups.
    List(CategoryListArgs),
}

/// (Not shown): Args for the `fintrack category add` command.
#[derive(Debug, Parser, Clone)]
pub struct CategoryAddArgs {
    /// income or expense
    #[arg(long)]
    group: Kind,

    #[arg(long)]
    name: String,

    /// An icon tag, e.g. "fas fa-car". Defaults to "fas fa-question".
    #[arg(long, default_value = "")]
    icon: String,

    /// A hex color, e.g. "#FF9800". Defaults to "#4CAF50".
    #[arg(long, default_value = "")]
    color: String,
}

impl CategoryAddArgs {
    pub fn new(group: Kind, name: impl Into<String>) -> Self {
        Self {
            group,
            name: name.into(),
            icon: String::new(),
            color: String::new(),
        }
    }

    pub fn group(&self) -> Kind {
        self.group
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn icon(&self) -> &str {
        &self.icon
    }

    pub fn color(&self) -> &str {
        &self.color
    }
}

/// (Not shown): Args for the `fintrack category delete` command.
#[derive(Debug, Parser, Clone)]
pub struct CategoryDeleteArgs {
    /// income or expense
    #[arg(long)]
    group: Kind,

    /// The category id or name.
    category: CategoryRef,
}

impl CategoryDeleteArgs {
    pub fn new(group: Kind, category: CategoryRef) -> Self {
        Self { group, category }
    }

    pub fn group(&self) -> Kind {
        self.group
    }

    pub fn category(&self) -> &CategoryRef {
        &self.category
    }
}

/// (Not shown): Args for the `fintrack category list` command.
#[derive(Debug, Default, Parser, Clone)]
pub struct CategoryListArgs {
    /// Only list this group.
    #[arg(long)]
    group: Option<Kind>,
}

impl CategoryListArgs {
    pub fn new(group: Option<Kind>) -> Self {
        Self { group }
    }

    pub fn group(&self) -> Option<Kind> {
        self.group
    }
}

/// (Not shown): Args for the `fintrack report` command.
#[derive(Debug, Parser, Clone)]
pub struct ReportArgs {
    #[command(subcommand)]
    report: ReportSubcommand,
}

impl ReportArgs {
    pub fn new(report: ReportSubcommand) -> Self {
        Self { report }
    }

    pub fn report(&self) -> &ReportSubcommand {
        &self.report
    }
}

#[derive(Subcommand, Debug, Clone)]
pub enum ReportSubcommand {
    /// Totals, savings rate, top expense categories and recent transactions for a month.
    Dashboard(MonthArgs),
    /// Income and expense for each month of a year.
    Yearly(YearArgs),
    /// The expense categories with the highest totals in a month.
    Top(TopArgs),
    /// Per-category expense totals, shares and averages for a month.
    Balance(MonthArgs),
}

/// (Not shown): Selects the month to report on.
#[derive(Debug, Default, Parser, Clone)]
pub struct MonthArgs {
    /// YYYY-MM. Defaults to the current month.
    #[arg(long)]
    month: Option<YearMonth>,
}

impl MonthArgs {
    pub fn new(month: Option<YearMonth>) -> Self {
        Self { month }
    }

    /// The requested month, or the current one.
    pub fn month(&self) -> YearMonth {
        self.month.unwrap_or_else(YearMonth::current)
    }
}

/// (Not shown): Args for the `fintrack report yearly` command.
#[derive(Debug, Default, Parser, Clone)]
pub struct YearArgs {
    /// Defaults to the current year.
    #[arg(long)]
    year: Option<i32>,
}

impl YearArgs {
    pub fn new(year: Option<i32>) -> Self {
        Self { year }
    }

    pub fn year(&self) -> i32 {
        self.year.unwrap_or_else(|| YearMonth::current().year())
    }
}

/// (Not shown): Args for the `fintrack report top` command.
#[derive(Debug, Parser, Clone)]
pub struct TopArgs {
    #[clap(flatten)]
    month: MonthArgs,

    /// How many categories to show.
    #[arg(long, default_value_t = 5)]
    count: usize,
}

impl TopArgs {
    pub fn new(month: Option<YearMonth>, count: usize) -> Self {
        Self {
            month: MonthArgs::new(month),
            count,
        }
    }

    pub fn month(&self) -> YearMonth {
        self.month.month()
    }

    pub fn count(&self) -> usize {
        self.count
    }
}

#[derive(Debug, Default, Copy, Clone, Eq, PartialEq, Serialize, Deserialize, ValueEnum)]
#[serde(rename_all = "snake_case")]
pub enum ExportFormat {
    /// A single JSON file that import can read back.
    #[default]
    Json,
    /// Two CSV files, one for transactions and one for categories.
    Csv,
}

serde_plain::derive_display_from_serialize!(ExportFormat);

/// (Not shown): Args for the `fintrack export` command.
#[derive(Debug, Parser, Clone)]
pub struct ExportArgs {
    #[arg(long, value_enum, default_value_t = ExportFormat::Json)]
    format: ExportFormat,

    /// The directory to write to. Defaults to the current directory.
    #[arg(long)]
    dir: Option<PathBuf>,
}

impl ExportArgs {
    pub fn new(format: ExportFormat, dir: Option<PathBuf>) -> Self {
        Self { format, dir }
    }

    pub fn format(&self) -> ExportFormat {
        self.format
    }

    pub fn dir(&self) -> Option<&Path> {
        self.dir.as_deref()
    }
}

/// (Not shown): Args for the `fintrack import` command.
#[derive(Debug, Parser, Clone)]
pub struct ImportArgs {
    /// The JSON file written by `fintrack export`.
    path: PathBuf,

    /// Keep existing data and add only records whose id is new. Without this flag all local data
    /// is replaced.
    #[arg(long)]
    merge: bool,

    /// Required to replace local data.
    #[arg(long)]
    yes: bool,
}

impl ImportArgs {
    pub fn new(path: impl Into<PathBuf>, merge: bool, yes: bool) -> Self {
        Self {
            path: path.into(),
            merge,
            yes,
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn merge(&self) -> bool {
        self.merge
    }

    pub fn yes(&self) -> bool {
        self.yes
    }
}

/// (Not shown): Confirms a command that replaces or deletes local data.
#[derive(Debug, Default, Parser, Clone)]
pub struct ConfirmArgs {
    /// Required. Without it, nothing is changed.
    #[arg(long)]
    yes: bool,
}

impl ConfirmArgs {
    pub fn new(yes: bool) -> Self {
        Self { yes }
    }

    pub fn yes(&self) -> bool {
        self.yes
    }
}

/// (Not shown): Args for the `fintrack sync` command.
#[derive(Debug, Parser, Clone)]
pub struct SyncArgs {
    #[command(subcommand)]
    direction: SyncSubcommand,
}

impl SyncArgs {
    pub fn new(direction: SyncSubcommand) -> Self {
        Self { direction }
    }

    pub fn direction(&self) -> &SyncSubcommand {
        &self.direction
    }
}

#[derive(Subcommand, Debug, Clone)]
pub enum SyncSubcommand {
    /// Push all local data to the remote now.
    Up,
    /// Replace all local data with the remote's data. A backup is written first.
    Down(ConfirmArgs),
    /// Stay running and push the local data every few minutes until interrupted.
    Auto,
    /// Show the remote endpoint and when the last successful push happened.
    Status,
}

fn default_fintrack_home() -> DisplayPath {
    DisplayPath(match dirs::home_dir() {
        Some(home) => home.join("fintrack"),
        None => {
            error!(
                "There was an error when trying to get your home directory. You can get around \
                this by providing --home or FINTRACK_HOME instead of relying on the default \
                fintrack home directory. If you continue using the program right now, you may \
                have problems!",
            );
            PathBuf::from("fintrack")
        }
    })
}

#[derive(Debug, Default, Clone, Eq, PartialEq, Ord, PartialOrd, Hash)]
pub struct DisplayPath(PathBuf);

impl From<PathBuf> for DisplayPath {
    fn from(value: PathBuf) -> Self {
        DisplayPath(value)
    }
}

impl Deref for DisplayPath {
    type Target = Path;

    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

impl AsRef<Path> for DisplayPath {
    fn as_ref(&self) -> &Path {
        &self.0
    }
}

impl Display for DisplayPath {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0.to_string_lossy())
    }
}

impl FromStr for DisplayPath {
    type Err = Infallible;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(Self(PathBuf::from(s)))
    }
}

impl DisplayPath {
    pub fn new(path: PathBuf) -> Self {
        Self(path)
    }

    pub fn path(&self) -> &Path {
        &self.0
    }
}
