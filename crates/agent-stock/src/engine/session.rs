//! Scoped controller usage

use super::controller::StockAnalysisController;
use crate::error::ControllerError;
use std::ops::{Deref, DerefMut};

/// Initializes a controller on acquire and cleans it up on drop
///
/// Cleanup runs however the scope is left: normal return, `?`, or a panic
/// unwinding through it.
///
/// ```rust,ignore
/// let mut controller = StockAnalysisController::new(config);
/// let mut session = ControllerSession::acquire(&mut controller).await?;
/// let record = session.execute_configured_analysis().await?;
/// ```
pub struct ControllerSession<'a> {
    controller: &'a mut StockAnalysisController,
}

impl<'a> ControllerSession<'a> {
    /// Initialize `controller` and guard it
    ///
    /// If initialization fails the controller is cleaned up before the error
    /// is returned.
    pub async fn acquire(
        controller: &'a mut StockAnalysisController,
    ) -> Result<Self, ControllerError> {
        if let Err(e) = controller.initialize().await {
            controller.cleanup();
            return Err(e);
        }
        Ok(Self { controller })
    }
}

impl Deref for ControllerSession<'_> {
    type Target = StockAnalysisController;

    fn deref(&self) -> &Self::Target {
        self.controller
    }
}

impl DerefMut for ControllerSession<'_> {
    fn deref_mut(&mut self) -> &mut Self::Target {
        self.controller
    }
}

impl Drop for ControllerSession<'_> {
    fn drop(&mut self) {
        self.controller.cleanup();
    }
}
