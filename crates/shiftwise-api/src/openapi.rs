//! # OpenAPI Specification Assembly
//!
//! Assembles all utoipa-documented routes into a single OpenAPI 3.1 spec
//! served at `/openapi.json`.

use axum::routing::get;
use axum::{Json, Router};
use utoipa::OpenApi;

use crate::state::AppState;

/// Assembled OpenAPI spec for the entire API surface.
#[derive(OpenApi)]
#[openapi(
    info(
        title = "Shiftwise API",
        version = "0.1.0",
        description = "Workforce scheduling: cover-up claims, shift swaps, attendance, leave, payroll, announcements, inquiries, and notifications.",
    ),
    paths(
        // Cover-ups
        crate::routes::cover_ups::list_open,
        crate::routes::cover_ups::list_all,
        crate::routes::cover_ups::open_cover_up,
        crate::routes::cover_ups::get_cover_up,
        crate::routes::cover_ups::claim_cover_up,
        crate::routes::cover_ups::cancel_cover_up,
        // Swaps
        crate::routes::swaps::propose_swap,
        crate::routes::swaps::list_swaps,
        crate::routes::swaps::my_swaps,
        crate::routes::swaps::get_swap,
        crate::routes::swaps::decide_swap,
        // Employees
        crate::routes::employees::create_employee,
        crate::routes::employees::list_employees,
        crate::routes::employees::get_employee,
        // Shifts
        crate::routes::shifts::create_shift,
        crate::routes::shifts::list_shifts,
        crate::routes::shifts::my_shifts,
        crate::routes::shifts::get_shift,
        crate::routes::shifts::confirm_shift,
        crate::routes::shifts::set_shift_status,
        // Attendance
        crate::routes::attendance::clock_in,
        crate::routes::attendance::clock_out,
        crate::routes::attendance::list_attendance,
        crate::routes::attendance::my_attendance,
        crate::routes::attendance::active_attendance,
        // Leaves
        crate::routes::leaves::create_leave,
        crate::routes::leaves::list_leaves,
        crate::routes::leaves::my_leaves,
        crate::routes::leaves::decide_leave,
        // Payroll
        crate::routes::payroll::create_run,
        crate::routes::payroll::list_runs,
        crate::routes::payroll::get_run,
        // Announcements
        crate::routes::announcements::list_announcements,
        crate::routes::announcements::create_announcement,
        crate::routes::announcements::get_announcement,
        crate::routes::announcements::update_announcement,
        crate::routes::announcements::delete_announcement,
        // Inquiries
        crate::routes::inquiries::create_inquiry,
        crate::routes::inquiries::list_inquiries,
        crate::routes::inquiries::my_inquiries,
        crate::routes::inquiries::get_inquiry,
        crate::routes::inquiries::answer_inquiry,
        crate::routes::inquiries::delete_inquiry,
        // Notifications
        crate::routes::notifications::my_notifications,
        crate::routes::notifications::mark_read,
    ),
    components(schemas(
        // State record types
        crate::state::EmployeeRecord,
        crate::state::ShiftRecord,
        crate::state::AttendanceRecord,
        crate::state::NotificationKind,
        crate::state::NotificationRecord,
        crate::state::PayrollDetailRecord,
        crate::state::PayrollRunRecord,
        crate::state::AnnouncementRecord,
        crate::state::InquiryStatus,
        crate::state::InquiryRecord,
        crate::auth::Role,
        // Error types
        crate::error::ErrorBody,
        crate::error::ErrorDetail,
        // Shared DTOs
        crate::routes::DecisionRequest,
        // Cover-up DTOs
        crate::routes::cover_ups::OpenCoverUpRequest,
        crate::routes::cover_ups::CoverUpView,
        // Swap DTOs
        crate::routes::swaps::ProposeSwapRequest,
        crate::routes::swaps::SwapView,
        // Employee DTOs
        crate::routes::employees::CreateEmployeeRequest,
        // Shift DTOs
        crate::routes::shifts::CreateShiftRequest,
        crate::routes::shifts::SetShiftStatusRequest,
        // Attendance DTOs
        crate::routes::attendance::ClockInRequest,
        crate::routes::attendance::ClockOutRequest,
        // Leave DTOs
        crate::routes::leaves::CreateLeaveRequest,
        crate::routes::leaves::LeaveView,
        // Payroll DTOs
        crate::routes::payroll::CreatePayrollRunRequest,
        // Announcement DTOs
        crate::routes::announcements::AnnouncementRequest,
        crate::routes::announcements::AnnouncementView,
        // Inquiry DTOs
        crate::routes::inquiries::CreateInquiryRequest,
        crate::routes::inquiries::AnswerInquiryRequest,
    )),
    tags(
        (name = "cover-ups", description = "Cover-up claim ledger"),
        (name = "swaps", description = "Shift swap arbitration"),
        (name = "employees", description = "Employee accounts"),
        (name = "shifts", description = "Schedule"),
        (name = "attendance", description = "Clock-in and clock-out"),
        (name = "leaves", description = "Leave requests"),
        (name = "payroll", description = "Payroll runs"),
        (name = "announcements", description = "Announcements"),
        (name = "inquiries", description = "Employee inquiries"),
        (name = "notifications", description = "In-app notifications"),
    )
)]
pub struct ApiDoc;

/// Build the OpenAPI router.
pub fn router() -> Router<AppState> {
    Router::new().route("/openapi.json", get(openapi_json))
}

/// GET /openapi.json — Return the generated OpenAPI specification.
async fn openapi_json() -> Json<utoipa::openapi::OpenApi> {
    Json(ApiDoc::openapi())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn spec_lists_claim_and_decision_paths() {
        let spec = ApiDoc::openapi();
        let paths = &spec.paths.paths;
        assert!(paths.contains_key("/v1/cover-ups/{id}/claim"));
        assert!(paths.contains_key("/v1/swaps/{id}/decision"));
        assert!(paths.contains_key("/v1/leaves/{id}/decision"));
        assert!(paths.contains_key("/v1/payroll/runs"));
        assert!(paths.contains_key("/v1/attendance/active"));
        assert!(paths.contains_key("/v1/announcements/{id}"));
        assert!(paths.contains_key("/v1/inquiries/{id}/answer"));
    }

    #[test]
    fn spec_serializes_to_json() {
        let json = serde_json::to_value(ApiDoc::openapi()).unwrap();
        assert_eq!(json["info"]["title"], "Shiftwise API");
    }
}
