//! Relational extractor
//!
//! Turns one SQL query into a pull-based stream of [`Record`]s. The extractor owns
//! exactly one connection, one statement and one cursor for its lifetime:
//!
//! ```text
//! NotStarted --configure--> Configured --begin--> Ready <--has_next/next--> Exhausted
//!      |                        |                   |                          |
//!      +--(configure fails)-----+--(begin fails)--> Failed <--(cursor fails)---+
//!                                                   |
//!                                  end (from any state) --> Closed
//! ```
//!
//! ```rust,ignore
//! let mut extractor = RdbcExtractor::new(Arc::new(DriverRegistry::with_defaults()));
//! extractor.configure(config).await?;
//! extractor.begin().await?;
//! while extractor.has_next().await? {
//!     let record = extractor.next().await?;
//!     // route record downstream
//! }
//! extractor.end().await;
//! ```

use async_trait::async_trait;
use std::fmt;
use std::sync::Arc;
use tracing::{debug, info, warn};

use crate::config::ExtractorConfig;
use crate::connection::{Connection, Cursor, Statement};
use crate::description::{ComponentDescription, ParameterDescription};
use crate::error::{Error, Result};
use crate::registry::DriverRegistry;
use crate::types::{ColumnSchema, Record};

/// Name the extractor registers under
pub const EXTRACTOR_NAME: &str = "rdbc";

/// Unit label reported alongside progress
pub const PROGRESS_UNIT: &str = "records";

/// Declared output element type
pub const OUTPUT_TYPE: &str = "Record";

/// Iteration contract between an extractor and the pipeline orchestrator
#[async_trait]
pub trait Extractor: Send {
    /// Extractor name
    fn name(&self) -> &str;

    /// Unit of the progress counters
    fn unit(&self) -> &str;

    /// Records yielded so far, -1 before the extraction started
    fn progress(&self) -> i64;

    /// Expected record count, -1 when unknown
    fn total(&self) -> i64;

    /// Parameters, output type and configuration schema
    fn describe(&self) -> ComponentDescription;

    /// Configure from a parameter mapping and acquire resources
    async fn configure(&mut self, params: &serde_json::Value) -> Result<()>;

    /// Start the extraction
    async fn begin(&mut self) -> Result<()>;

    /// Whether another record is available (may advance the source)
    async fn has_next(&mut self) -> Result<bool>;

    /// The next record
    async fn next(&mut self) -> Result<Record>;

    /// Release all resources
    async fn end(&mut self);
}

/// Lifecycle state of an extractor
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ExtractorState {
    /// Created, no connection yet
    NotStarted,
    /// Connection open, no query executed
    Configured,
    /// Cursor open and iterable
    Ready,
    /// Cursor drained
    Exhausted,
    /// Configuration or extraction failed; only `end` is valid
    Failed,
    /// Resources released
    Closed,
}

impl ExtractorState {
    /// Whether `has_next`/`next` are valid in this state
    #[inline]
    pub const fn is_iterable(self) -> bool {
        matches!(self, Self::Ready | Self::Exhausted)
    }
}

impl fmt::Display for ExtractorState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NotStarted => write!(f, "not started"),
            Self::Configured => write!(f, "configured"),
            Self::Ready => write!(f, "ready"),
            Self::Exhausted => write!(f, "exhausted"),
            Self::Failed => write!(f, "failed"),
            Self::Closed => write!(f, "closed"),
        }
    }
}

/// Progress counters of one extraction run
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CursorState {
    /// Records yielded; -1 before `begin`, 0 once the cursor is open
    pub progress: i64,
    /// Advisory total from the count query; -1 when unknown
    pub total: i64,
    /// Whether the cursor reported its end
    pub exhausted: bool,
}

impl Default for CursorState {
    fn default() -> Self {
        Self {
            progress: -1,
            total: -1,
            exhausted: false,
        }
    }
}

/// Extractor reading records from a relational source through a registered driver
pub struct RdbcExtractor {
    drivers: Arc<DriverRegistry>,
    state: ExtractorState,
    config: Option<ExtractorConfig>,
    connection: Option<Box<dyn Connection>>,
    statement: Option<Box<dyn Statement>>,
    cursor: Option<Box<dyn Cursor>>,
    schema: Option<Arc<ColumnSchema>>,
    counters: CursorState,
    /// Memoized result of the last advance not yet consumed by `next`
    lookahead: Option<bool>,
}

impl RdbcExtractor {
    /// Create an extractor resolving drivers from the given registry
    pub fn new(drivers: Arc<DriverRegistry>) -> Self {
        Self {
            drivers,
            state: ExtractorState::NotStarted,
            config: None,
            connection: None,
            statement: None,
            cursor: None,
            schema: None,
            counters: CursorState::default(),
            lookahead: None,
        }
    }

    /// Current lifecycle state
    #[inline]
    pub fn state(&self) -> ExtractorState {
        self.state
    }

    /// Progress counters
    #[inline]
    pub fn cursor_state(&self) -> CursorState {
        self.counters
    }

    /// Column schema of the running extraction
    pub fn schema(&self) -> Option<&Arc<ColumnSchema>> {
        self.schema.as_ref()
    }

    /// Active configuration
    pub fn config(&self) -> Option<&ExtractorConfig> {
        self.config.as_ref()
    }

    /// Resolve the driver and open the connection.
    ///
    /// No query runs here. Fails with a configuration error when the driver is not
    /// registered or the connection cannot be established; the extractor is then
    /// failed and only [`end`](Self::end) remains valid.
    pub async fn configure_with(&mut self, config: ExtractorConfig) -> Result<()> {
        if self.state != ExtractorState::NotStarted {
            return Err(Error::invalid_state("configure", self.state));
        }

        match connect(&self.drivers, &config).await {
            Ok(connection) => {
                self.connection = Some(connection);
                self.config = Some(config);
                self.state = ExtractorState::Configured;
                Ok(())
            }
            Err(e) => {
                self.state = ExtractorState::Failed;
                Err(e)
            }
        }
    }

    /// Execute the count query (if any) and the extraction query, then build the
    /// column schema.
    pub async fn begin(&mut self) -> Result<()> {
        if self.state != ExtractorState::Configured {
            return Err(Error::invalid_state("begin", self.state));
        }
        let config = match self.config.clone() {
            Some(config) => config,
            None => return Err(Error::invalid_state("begin", self.state)),
        };

        match self.open_cursor(&config).await {
            Ok((cursor, total)) => {
                let schema = ColumnSchema::from_descriptors(cursor.columns());
                debug!(
                    columns = ?schema.names(),
                    "{}: built column schema",
                    EXTRACTOR_NAME
                );
                self.schema = Some(Arc::new(schema));
                self.cursor = Some(cursor);
                self.counters.total = total;
                self.counters.progress = 0;
                self.state = ExtractorState::Ready;

                info!(query = %config.query, total, "{}: extraction started", EXTRACTOR_NAME);
                Ok(())
            }
            Err(e) => {
                self.state = ExtractorState::Failed;
                Err(Error::extraction(
                    "error on executing query",
                    config.query,
                    self.counters.progress,
                    e,
                ))
            }
        }
    }

    async fn open_cursor(&mut self, config: &ExtractorConfig) -> Result<(Box<dyn Cursor>, i64)> {
        let connection = self
            .connection
            .as_mut()
            .ok_or_else(|| Error::connection("connection is not open"))?;
        let statement = self
            .statement
            .insert(connection.create_statement().await?);

        let total = match &config.query_count {
            Some(query_count) => read_count(statement.as_mut(), query_count).await,
            None => -1,
        };

        let cursor = statement.execute_query(&config.query).await?;
        Ok((cursor, total))
    }

    /// Whether another record is available.
    ///
    /// The first call after `begin` or `next` advances the cursor and memoizes the
    /// answer; repeated calls return the memoized answer without advancing again.
    pub async fn has_next(&mut self) -> Result<bool> {
        if !self.state.is_iterable() {
            return Err(Error::invalid_state("check for records", self.state));
        }
        if let Some(has_next) = self.lookahead {
            return Ok(has_next);
        }

        let has_next = self.advance().await?;
        self.lookahead = Some(has_next);
        Ok(has_next)
    }

    /// The record at the next cursor position.
    ///
    /// Advances first when no lookahead is memoized. Fails with an exhaustion
    /// error when no row is available.
    pub async fn next(&mut self) -> Result<Record> {
        if !self.state.is_iterable() {
            return Err(Error::invalid_state("read a record", self.state));
        }

        let has_row = match self.lookahead.take() {
            Some(has_row) => has_row,
            None => self.advance().await?,
        };
        if !has_row {
            return Err(Error::exhausted(self.counters.progress));
        }

        self.read_record().await
    }

    async fn advance(&mut self) -> Result<bool> {
        if self.counters.exhausted {
            return Ok(false);
        }
        let Some(cursor) = self.cursor.as_mut() else {
            return Err(Error::invalid_state("advance", self.state));
        };

        match cursor.advance().await {
            Ok(true) => {
                self.counters.progress += 1;
                Ok(true)
            }
            Ok(false) => {
                self.counters.exhausted = true;
                self.state = ExtractorState::Exhausted;
                debug!(
                    progress = self.counters.progress,
                    "{}: result set exhausted",
                    EXTRACTOR_NAME
                );
                Ok(false)
            }
            Err(e) => Err(self.fail("error on moving forward in result set", e)),
        }
    }

    async fn read_record(&mut self) -> Result<Record> {
        let (Some(cursor), Some(schema)) = (self.cursor.as_mut(), self.schema.as_ref()) else {
            return Err(Error::invalid_state("read a record", self.state));
        };

        match cursor.read_row().await {
            Ok(values) if values.len() == schema.len() => {
                let columns = schema.names().into_iter().map(String::from).collect();
                Ok(Record::new(columns, values))
            }
            Ok(values) => {
                let cause = Error::type_conversion(format!(
                    "row has {} values but the result declares {} columns",
                    values.len(),
                    schema.len()
                ));
                Err(self.fail("error on reading record", cause))
            }
            Err(e) => Err(self.fail("error on reading record", e)),
        }
    }

    fn fail(&mut self, message: &str, cause: Error) -> Error {
        self.state = ExtractorState::Failed;
        self.lookahead = None;
        let query = self
            .config
            .as_ref()
            .map(|c| c.query.clone())
            .unwrap_or_default();
        Error::extraction(message, query, self.counters.progress, cause)
    }

    /// Release cursor, statement and connection, in that order.
    ///
    /// Each release is attempted even if an earlier one failed; failures are logged
    /// and never returned. Calling `end` again is a no-op.
    pub async fn end(&mut self) {
        if self.state == ExtractorState::Closed {
            return;
        }

        if let Some(mut cursor) = self.cursor.take() {
            if let Err(e) = cursor.close().await {
                warn!(error = %e, "{}: failed to close cursor", EXTRACTOR_NAME);
            }
        }
        if let Some(mut statement) = self.statement.take() {
            if let Err(e) = statement.close().await {
                warn!(error = %e, "{}: failed to close statement", EXTRACTOR_NAME);
            }
        }
        if let Some(mut connection) = self.connection.take() {
            if let Err(e) = connection.close().await {
                warn!(error = %e, "{}: failed to close connection", EXTRACTOR_NAME);
            }
        }

        self.schema = None;
        self.lookahead = None;
        self.state = ExtractorState::Closed;
        info!(
            progress = self.counters.progress,
            total = self.counters.total,
            "{}: extraction ended",
            EXTRACTOR_NAME
        );
    }

    /// Records yielded so far
    #[inline]
    pub fn progress(&self) -> i64 {
        self.counters.progress
    }

    /// Advisory record count, -1 when unknown
    #[inline]
    pub fn total(&self) -> i64 {
        self.counters.total
    }

    /// Parameter description of this extractor
    pub fn description() -> ComponentDescription {
        ComponentDescription::new(EXTRACTOR_NAME, OUTPUT_TYPE)
            .parameter(ParameterDescription::required(
                "driver",
                "Registered driver id",
            ))
            .parameter(ParameterDescription::required("url", "Connection URL"))
            .parameter(ParameterDescription::required("userName", "User name"))
            .parameter(ParameterDescription::required(
                "userPassword",
                "User password",
            ))
            .parameter(ParameterDescription::required(
                "query",
                "Query that extracts records",
            ))
            .parameter(ParameterDescription::optional(
                "queryCount",
                "Query that returns the count to have a correct progress status",
            ))
            .config_schema_from::<ExtractorConfig>()
    }
}

/// Resolve the configured driver and open a connection
async fn connect(
    drivers: &DriverRegistry,
    config: &ExtractorConfig,
) -> Result<Box<dyn Connection>> {
    config.check()?;

    let driver = drivers.resolve(&config.driver)?;
    let conn_config = config.connection_config();

    info!(
        driver = %config.driver,
        url = %conn_config.redacted_url(),
        user = %config.user_name,
        "{}: connecting",
        EXTRACTOR_NAME
    );

    driver.connect(&conn_config).await.map_err(|e| {
        Error::config_with_source(
            format!(
                "error on connecting to url '{}' using user '{}' and the password provided",
                conn_config.redacted_url(),
                config.user_name
            ),
            e,
        )
    })
}

/// Run the count query and read row 0, column 0 as an integer.
///
/// Every failure degrades to -1: the count only feeds progress reporting.
async fn read_count(statement: &mut dyn Statement, query_count: &str) -> i64 {
    let mut cursor = match statement.execute_query(query_count).await {
        Ok(cursor) => cursor,
        Err(e) => {
            warn!(
                query = %query_count,
                error = %e,
                "{}: count query failed, total unknown",
                EXTRACTOR_NAME
            );
            return -1;
        }
    };

    let total = match cursor.advance().await {
        Ok(true) => match cursor.read_row().await {
            Ok(values) => match values.first().and_then(|v| v.as_i64()) {
                Some(count) => count,
                None => {
                    warn!(
                        query = %query_count,
                        "{}: count query did not return an integer, total unknown",
                        EXTRACTOR_NAME
                    );
                    -1
                }
            },
            Err(e) => {
                warn!(
                    query = %query_count,
                    error = %e,
                    "{}: failed to read count, total unknown",
                    EXTRACTOR_NAME
                );
                -1
            }
        },
        Ok(false) => {
            debug!(
                query = %query_count,
                "{}: count query returned no rows",
                EXTRACTOR_NAME
            );
            -1
        }
        Err(e) => {
            warn!(
                query = %query_count,
                error = %e,
                "{}: failed to read count, total unknown",
                EXTRACTOR_NAME
            );
            -1
        }
    };

    if let Err(e) = cursor.close().await {
        warn!(error = %e, "{}: failed to close count cursor", EXTRACTOR_NAME);
    }
    total
}

impl fmt::Debug for RdbcExtractor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RdbcExtractor")
            .field("state", &self.state)
            .field("config", &self.config)
            .field("counters", &self.counters)
            .field("lookahead", &self.lookahead)
            .finish()
    }
}

#[async_trait]
impl Extractor for RdbcExtractor {
    fn name(&self) -> &str {
        EXTRACTOR_NAME
    }

    fn unit(&self) -> &str {
        PROGRESS_UNIT
    }

    fn progress(&self) -> i64 {
        RdbcExtractor::progress(self)
    }

    fn total(&self) -> i64 {
        RdbcExtractor::total(self)
    }

    fn describe(&self) -> ComponentDescription {
        Self::description()
    }

    async fn configure(&mut self, params: &serde_json::Value) -> Result<()> {
        if self.state != ExtractorState::NotStarted {
            return Err(Error::invalid_state("configure", self.state));
        }
        let config = match ExtractorConfig::from_value(params) {
            Ok(config) => config,
            Err(e) => {
                self.state = ExtractorState::Failed;
                return Err(e);
            }
        };
        self.configure_with(config).await
    }

    async fn begin(&mut self) -> Result<()> {
        RdbcExtractor::begin(self).await
    }

    async fn has_next(&mut self) -> Result<bool> {
        RdbcExtractor::has_next(self).await
    }

    async fn next(&mut self) -> Result<Record> {
        RdbcExtractor::next(self).await
    }

    async fn end(&mut self) {
        RdbcExtractor::end(self).await
    }
}
