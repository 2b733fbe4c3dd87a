//! Intent Recognizer Port - NLU interface.

use async_trait::async_trait;

use super::{ProviderComponent, ProviderError};
use crate::domain::foundation::SessionId;
use crate::domain::intent::Intent;

/// Port for natural-language understanding.
///
/// Implementations return [`Intent::recognition_fallback`] for text they
/// cannot classify; an `Err` means the recognizer itself failed.
#[async_trait]
pub trait IntentRecognizer: ProviderComponent {
    async fn recognize(
        &self,
        text: &str,
        session_id: &SessionId,
        language: &str,
    ) -> Result<Intent, ProviderError>;
}
