//! Shared process state handed to every router (§6). One struct rather
//! than the teacher's one-state-per-aggregate split: the webhook, manual
//! trigger, and flow CRUD handlers all need the same repository set, so
//! splitting them would just duplicate the field list.

use std::sync::Arc;

use flowline_engine::broadcast::BroadcastRepository;
use flowline_engine::contact::ContactRepository;
use flowline_engine::flow::repository::FlowRepository;
use flowline_engine::log::LogRepository;
use flowline_engine::session::SessionRepository;
use flowline_engine::user::UserRepository;
use flowline_whatsapp::WhatsAppClient;

#[derive(Clone)]
pub struct EngineState {
    pub user_repo: Arc<UserRepository>,
    pub contact_repo: Arc<ContactRepository>,
    pub flow_repo: Arc<FlowRepository>,
    pub session_repo: Arc<SessionRepository>,
    pub broadcast_repo: Arc<BroadcastRepository>,
    pub log_repo: Arc<LogRepository>,
    pub whatsapp: Arc<WhatsAppClient>,
    pub verify_token: Arc<String>,
}
