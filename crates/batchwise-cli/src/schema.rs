//! Record types of the bundled CSV-to-XML job.

use serde::{Deserialize, Serialize};

/// Input row of the `inputData*.csv` files.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct User {
    pub first_value: String,
    pub second_value: String,
    pub third_value: String,
}

/// Intermediate record written by step 1 and read back by step 2.
/// Empty CSV fields read as `None`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize, Serialize)]
pub struct Profile {
    pub id: Option<String>,
    pub email: Option<String>,
    pub brand: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Account {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub user_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub user_email: Option<String>,
    pub completed: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub user_brand: Option<String>,
}
