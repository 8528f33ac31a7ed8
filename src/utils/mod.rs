pub mod logging;
pub mod vecmath;
