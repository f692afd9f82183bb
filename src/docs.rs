use crate::api::attendance::{CheckOutBody, SweepBody};
use crate::api::correction::{CorrectionFilter, CorrectionListResponse, ReviewBody};
use crate::model::Actor;
use crate::model::attendance::{
    AttendanceRecord, AttendanceType, CheckInEntry, CheckInMethod, CheckInStatus,
    CorrectionAudit, TimeSlot,
};
use crate::model::correction::{
    CorrectionPriority, CorrectionRequest, CorrectionStatus, CorrectionType,
};
use crate::model::entity::{
    CurrentSession, EngagementLevel, EngagementStats, EntitySchedule, EntityStatus,
    TrackedEntity,
};
use crate::service::correction::SubmitCorrection;
use crate::service::session::{CheckInOutcome, CheckInRequest, CheckOutOutcome};
use crate::service::sweeper::{SweepFailure, SweepOutcome, SweptSession};
use utoipa::OpenApi;

#[derive(OpenApi)]
#[openapi(
    info(
        title = "Attendly API",
        version = "1.0.0",
        description = r#"
## Attendance Session & Correction Engine

Multi-tenant presence tracking for members, employees and students:
check-in/check-out session lifecycle, schedule-aware attendance
classification, engagement/streak statistics and an approval workflow
for retroactive corrections.

### Key Features
- **Sessions**
  - Check-in, check-out and single-tap kiosk toggle (by id or badge)
- **Classification**
  - Schedule-aware or time-based attendance typing at check-out
- **Corrections**
  - Submit, approve/reject and apply retroactive edits with a full audit trail
- **Expiry Sweeping**
  - Batch auto-checkout of sessions left open past their expected end

### Attribution
Every mutating call carries `X-Tenant-Id` and `X-Actor-Id` headers;
authorization is enforced by the upstream gateway.

---
Built with **Rust**, **Actix Web**, **SQLx**, and **Utoipa**.
"#,
    ),
    paths(
        crate::api::attendance::check_in,
        crate::api::attendance::check_out,
        crate::api::attendance::toggle,
        crate::api::attendance::badge_toggle,
        crate::api::attendance::get_record,
        crate::api::attendance::get_stats,
        crate::api::attendance::run_sweep,

        crate::api::correction::submit,
        crate::api::correction::approve,
        crate::api::correction::reject,
        crate::api::correction::apply,
        crate::api::correction::list
    ),
    components(
        schemas(
            Actor,
            AttendanceRecord,
            AttendanceType,
            CheckInEntry,
            CheckInMethod,
            CheckInOutcome,
            CheckInRequest,
            CheckInStatus,
            CheckOutBody,
            CheckOutOutcome,
            CorrectionAudit,
            CorrectionFilter,
            CorrectionListResponse,
            CorrectionPriority,
            CorrectionRequest,
            CorrectionStatus,
            CorrectionType,
            CurrentSession,
            EngagementLevel,
            EngagementStats,
            EntitySchedule,
            EntityStatus,
            ReviewBody,
            SubmitCorrection,
            SweepBody,
            SweepFailure,
            SweepOutcome,
            SweptSession,
            TimeSlot,
            TrackedEntity
        )
    ),
    tags(
        (name = "Attendance", description = "Session lifecycle APIs"),
        (name = "Corrections", description = "Correction request workflow APIs"),
    )
)]
pub struct ApiDoc;
