//! Business endpoints of the tenant service.
//!
//! Each call is one request on the authenticated tenant client. A non-200
//! outcome left after the interceptors ran is turned into an
//! [`HttpStatusError`](crate::http::HttpStatusError).

use anyhow::{Context, Result};
use log::debug;
use serde::Serialize;
use serde_json::Value;

use crate::http::{HttpClient, RequestSpec};
use crate::session::TenantSession;

/// Parameters of the activity attendance report.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ReportRequest {
    pub activity_ids: Vec<String>,
    pub site_prefix: String,
    pub from_date: String,
    pub to_date: String,
    pub grade_ids: Vec<String>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct ReportBody<'a> {
    activities: String,
    site_prefix: &'a str,
    from_date: &'a str,
    to_date: &'a str,
    grades: String,
}

impl ReportRequest {
    /// JSON body with the id lists joined by commas.
    pub fn to_body(&self) -> Result<Value> {
        let body = ReportBody {
            activities: self.activity_ids.join(","),
            site_prefix: &self.site_prefix,
            from_date: &self.from_date,
            to_date: &self.to_date,
            grades: self.grade_ids.join(","),
        };
        serde_json::to_value(body).context("Failed to serialize report request")
    }
}

/// Typed access to the tenant's business endpoints.
#[derive(Debug)]
pub struct TenantApi {
    session: TenantSession,
}

impl TenantApi {
    pub fn new(session: TenantSession) -> Self {
        Self { session }
    }

    pub fn client(&self) -> &HttpClient {
        &self.session.tenant
    }

    pub fn session(&self) -> &TenantSession {
        &self.session
    }

    /// Current attendance status of the user's classrooms.
    #[tracing::instrument(skip(self))]
    pub async fn attendance_info(&self) -> Result<Value> {
        self.get("classroom/getAllAttendanceInfo").await
    }

    /// All activities of the school.
    #[tracing::instrument(skip(self))]
    pub async fn activities(&self) -> Result<Value> {
        self.get("activity/getAllActivities").await
    }

    #[tracing::instrument(skip(self, request))]
    pub async fn activity_attendance_report(&self, request: &ReportRequest) -> Result<Value> {
        let spec = RequestSpec::post("v2/Reports/ActivityAttendanceReport")
            .query("schoolCode", self.session.school_code())
            .json(request.to_body()?);

        debug!(
            "Requesting attendance report for {} activities",
            request.activity_ids.len()
        );

        let response = self.client().execute(spec).await?;
        Ok(response
            .into_json()
            .context("Activity attendance report failed")?)
    }

    async fn get(&self, path: &str) -> Result<Value> {
        let response = self.client().execute(RequestSpec::get(path)).await?;
        Ok(response
            .into_json()
            .with_context(|| format!("GET {} failed", path))?)
    }
}
