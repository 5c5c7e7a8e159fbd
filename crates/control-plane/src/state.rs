use crate::reconciler::Reconciler;
use std::sync::Arc;

#[derive(Clone)]
pub struct AppState {
    pub reconciler: Arc<Reconciler>,
}
