//! PowerQuery execution.
//!
//! A PowerQuery is a named, parameterized query exposed as a pseudo-resource
//! (for example `ws/schema/query/com.pearson.core.student.search`). Its
//! arguments travel as a JSON body on both the count request and every page
//! request.

use crate::error::{RestError, Result};
use crate::response;
use crate::rest::PowerSchool;
use reqwest::Method;
use serde_json::Value;
use url::Url;

impl PowerSchool {
    /// Run a PowerQuery and collect every record it returns
    ///
    /// # Arguments
    /// * `endpoint` - PowerQuery endpoint, relative to the server
    /// * `args` - Query arguments; an empty object is sent when `None`
    ///
    /// # Returns
    /// All records, in page order. Validation failures are reported as
    /// [`RestError::Validation`] with the per-field errors, other server
    /// messages as [`RestError::Api`]. No partial results are returned.
    pub async fn power_query(&self, endpoint: &str, args: Option<&Value>) -> Result<Vec<Value>> {
        let empty = Value::Object(Default::default());
        let body = args.unwrap_or(&empty);

        let url = self.url(endpoint)?;
        let count_url = PowerSchool::count_url(&url);

        let count_body = self
            .send(Method::POST, count_url, &[], Some(body))
            .await
            .inspect_err(|e| report(endpoint, e))?;
        let total = response::query_count(&count_body)
            .map_err(|e| RestError::from_body(None, &count_body).unwrap_or(e))
            .inspect_err(|e| report(endpoint, e))?;

        if total == 0 {
            return Ok(Vec::new());
        }

        let url = &url;
        self.paginate(total, |page| async move {
            let query = self.page_params(&[], page);
            self.query_page(url, &query, body)
                .await
                .inspect_err(|e| report(endpoint, e))
        })
        .await
    }

    async fn query_page(
        &self,
        url: &Url,
        query: &[(&'static str, String)],
        body: &Value,
    ) -> Result<Vec<Value>> {
        let mut page = self
            .send(Method::POST, url.clone(), query, Some(body))
            .await?;

        match page.get_mut("record").map(Value::take) {
            Some(Value::Array(records)) => Ok(records),
            Some(Value::Null) => Ok(Vec::new()),
            Some(other) => Ok(vec![other]),
            None => Err(RestError::from_body(None, &page).unwrap_or_else(|| {
                RestError::UnexpectedShape("PowerQuery page without record".to_string())
            })),
        }
    }
}

/// Log a failure with the detail appropriate to its kind
fn report(endpoint: &str, error: &RestError) {
    match error {
        RestError::Validation { message, errors } => {
            tracing::error!(endpoint, %message, %errors, "PowerQuery rejected its arguments")
        }
        RestError::Api { message, status } => {
            tracing::error!(endpoint, %message, ?status, "PowerQuery failed")
        }
        other => tracing::error!(endpoint, error = %other, "error executing PowerQuery"),
    }
}
