//! Shared application state injected into the handlers.

use std::sync::Arc;

use crate::domain::UserDirectory;
use crate::infrastructure::{ConnectionRegistry, SessionStore};
use crate::usecase::{
    ChatUseCase, DisconnectUseCase, LifecycleUseCase, MembershipUseCase, ModerationUseCase,
    ProductionUseCase, SignalingUseCase,
};

/// Shared application state
pub struct AppState {
    pub registry: Arc<ConnectionRegistry>,
    pub store: Arc<SessionStore>,
    pub directory: Arc<dyn UserDirectory>,
    pub lifecycle_usecase: Arc<LifecycleUseCase>,
    pub membership_usecase: Arc<MembershipUseCase>,
    pub chat_usecase: Arc<ChatUseCase>,
    pub moderation_usecase: Arc<ModerationUseCase>,
    pub signaling_usecase: Arc<SignalingUseCase>,
    pub production_usecase: Arc<ProductionUseCase>,
    pub disconnect_usecase: Arc<DisconnectUseCase>,
}
