use tokio::time::Instant;

use crate::{dto::view::FullView, state::SharedState};

/// Everything a surface needs to paint itself from scratch.
pub async fn current_view(state: &SharedState) -> FullView {
    state.session().lock().await.full_view(Instant::now())
}
