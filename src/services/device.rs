use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Errors reported by the managed device or its driver
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum DeviceError {
    #[error("Element '{0}' not found")]
    ElementNotFound(String),

    #[error("Table {table_id} unavailable on element '{element}'")]
    TableUnavailable { element: String, table_id: u32 },

    #[error("Write to parameter {parameter_id} on '{element}' failed: {reason}")]
    WriteFailed {
        element: String,
        parameter_id: u32,
        reason: String,
    },

    #[error("Malformed row '{key}': {reason}")]
    MalformedRow { key: String, reason: String },

    #[error("Invalid forwarding address '{0}'")]
    InvalidAddress(String),

    #[error("Device error: {0}")]
    Other(String),
}

pub type DeviceResult<T> = Result<T, DeviceError>;

/// One row of a device table, keyed by its primary key
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct TableRow {
    pub key: String,
    pub cells: BTreeMap<u32, String>,
}

impl TableRow {
    pub fn new(key: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            cells: BTreeMap::new(),
        }
    }

    /// Builder-style cell setter
    pub fn with_cell(mut self, column: u32, value: impl Into<String>) -> Self {
        self.cells.insert(column, value.into());
        self
    }

    pub fn cell(&self, column: u32) -> Option<&str> {
        self.cells.get(&column).map(String::as_str)
    }

    /// Cell value, or the empty string when the cell is missing
    pub fn cell_or_empty(&self, column: u32) -> &str {
        self.cell(column).unwrap_or_default()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Comparison {
    Equal,
    NotEqual,
}

/// Column filter applied by the device when querying a table
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ColumnFilter {
    pub column: u32,
    pub comparison: Comparison,
    pub value: String,
}

impl ColumnFilter {
    pub fn equal(column: u32, value: impl Into<String>) -> Self {
        Self {
            column,
            comparison: Comparison::Equal,
            value: value.into(),
        }
    }

    pub fn not_equal(column: u32, value: impl Into<String>) -> Self {
        Self {
            column,
            comparison: Comparison::NotEqual,
            value: value.into(),
        }
    }

    /// Evaluate the filter against a row; a missing cell compares as empty
    pub fn matches(&self, row: &TableRow) -> bool {
        let cell = row.cell_or_empty(self.column);
        match self.comparison {
            Comparison::Equal => cell == self.value,
            Comparison::NotEqual => cell != self.value,
        }
    }
}

/// Lifecycle of one scan on the device, as encoded in the scan-channel table
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ScanMode {
    Starting = 1,
    Running = 2,
    Canceling = 3,
    Finishing = 4,
    Finished = 5,
    Failed = 6,
    FinishedRemoved = 7,
}

impl ScanMode {
    pub fn from_code(code: i64) -> Option<Self> {
        match code {
            1 => Some(Self::Starting),
            2 => Some(Self::Running),
            3 => Some(Self::Canceling),
            4 => Some(Self::Finishing),
            5 => Some(Self::Finished),
            6 => Some(Self::Failed),
            7 => Some(Self::FinishedRemoved),
            _ => None,
        }
    }

    /// Parse the encoded cell value; unknown or malformed codes yield `None`
    pub fn from_cell(cell: &str) -> Option<Self> {
        cell.trim().parse::<i64>().ok().and_then(Self::from_code)
    }

    pub fn is_finished(&self) -> bool {
        matches!(self, Self::Finished | Self::FinishedRemoved)
    }
}

/// Read side of the managed device
#[async_trait]
pub trait DeviceTableSource: Send + Sync {
    /// Query a table on an element; every filter must match for a row to be returned
    async fn query_table(
        &self,
        element: &str,
        table_id: u32,
        filters: &[ColumnFilter],
    ) -> DeviceResult<Vec<TableRow>>;
}

/// Write side of the managed device
#[async_trait]
pub trait CommandDispatch: Send + Sync {
    /// Push a serialized request to a standalone parameter
    async fn set_parameter(&self, element: &str, parameter_id: u32, payload: &str)
        -> DeviceResult<()>;

    /// Write one cell of a table row, addressed by column parameter and row key
    async fn set_cell(
        &self,
        element: &str,
        column: u32,
        row_key: &str,
        value: &str,
    ) -> DeviceResult<()>;
}
