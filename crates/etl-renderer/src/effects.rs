//! Passes that run after every surface of a view has been drawn.

use crate::device::GraphicsDevice;
use crate::geometry::PendingFlare;
use crate::tr_local::ViewParms;

/// Sun and flare passes supplied by the host. They read the final depth
/// buffer, so they only run once the surface list is finished.
pub trait DeferredEffects: Send {
    /// Called only when sky was drawn in this view.
    fn draw_sun(&mut self, _device: &mut dyn GraphicsDevice, _view: &ViewParms) {}

    fn render_flares(&mut self, _device: &mut dyn GraphicsDevice, _view: &ViewParms, _flares: &[PendingFlare]) {}
}

/// No sun, no flares.
#[derive(Clone, Copy, Debug, Default)]
pub struct NoEffects;

impl DeferredEffects for NoEffects {}
