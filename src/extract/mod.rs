//! Positioned text fragments pulled out of a document, one list per page.
//!
//! Coordinates use PDF user space: `y` grows towards the top of the page.
//! Sources with a top-left origin must flip `y` before handing fragments in.

mod pdf;

pub use pdf::PdfFragmentSource;

use crate::cancellation::CancellationToken;
use crate::error::DocumentParseError;

/// A run of text drawn at a single position.
#[derive(Debug, Clone, PartialEq)]
pub struct Fragment {
    pub text: String,
    pub x: f32,
    pub y: f32,
}

impl Fragment {
    pub fn new(text: impl Into<String>, x: f32, y: f32) -> Self {
        Self {
            text: text.into(),
            x,
            y,
        }
    }
}

/// The unordered fragments of one page. `page` is 1-based.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct PageFragments {
    pub page: usize,
    pub fragments: Vec<Fragment>,
}

impl PageFragments {
    pub fn new(page: usize, fragments: Vec<Fragment>) -> Self {
        Self { page, fragments }
    }
}

/// Anything that can turn raw document bytes into per-page fragments.
///
/// Implementations check `cancel` between pages and bail out with
/// [`DocumentParseError::Cancelled`] once it is set.
pub trait FragmentSource {
    fn extract(
        &self,
        bytes: &[u8],
        cancel: &CancellationToken,
    ) -> Result<Vec<PageFragments>, DocumentParseError>;
}
