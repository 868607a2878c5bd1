pub mod footer;
pub mod header;
pub mod utils;

pub use footer::{draw_footer, StatusMessage};
pub use header::{draw_header, extract_domain, HeaderInfo};
pub use utils::{status_color, truncate};
