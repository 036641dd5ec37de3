mod headless_surface;

pub use headless_surface::{HeadlessSurface, HeadlessSurfaceProvider};
