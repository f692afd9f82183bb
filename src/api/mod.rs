pub mod actor;
pub mod attendance;
pub mod correction;

use crate::service::correction::CorrectionService;
use crate::service::session::SessionService;
use crate::service::sweeper::ExpirySweeper;
use crate::store::mysql::{MySqlAttendanceStore, MySqlEntityStore};

// Concrete service types the handlers receive from app data.
pub type AppSessionService = SessionService<MySqlAttendanceStore, MySqlEntityStore>;
pub type AppCorrectionService = CorrectionService<MySqlAttendanceStore, MySqlEntityStore>;
pub type AppSweeper = ExpirySweeper<MySqlAttendanceStore, MySqlEntityStore>;
pub type AppEntityRegistry = crate::store::EntityRegistry<MySqlEntityStore>;
