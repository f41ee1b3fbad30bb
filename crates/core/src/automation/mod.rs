//! Browser automation surface used by booking runs.

mod error;
mod traits;
mod webdriver;

pub use error::SurfaceError;
pub use traits::{AutomationSurface, Key, SurfaceLauncher};
pub use webdriver::{WebDriverLauncher, WebDriverSurface};
