//! Utilities used in tests in multiple crates within the workspace.

use std::{
    fmt::{Debug, Display},
    marker::PhantomData,
};

use googletest::{
    description::Description,
    matcher::{Matcher, MatcherBase, MatcherResult},
};

/// Creates a matcher against an `anyhow::Error` that downcasts to the given
/// type and matches the inner matcher. The concrete error may be the error
/// itself or any context attached to it.
pub fn anyhow_downcasts_to<E, M>(inner: M) -> AnyhowDowncastTo<E, M> {
    AnyhowDowncastTo::<E, M> {
        inner,
        phantom_e: Default::default(),
    }
}

pub struct AnyhowDowncastTo<E, M> {
    inner: M,
    phantom_e: PhantomData<E>,
}

impl<E, M> AnyhowDowncastTo<E, M> {
    fn type_name() -> &'static str {
        std::any::type_name::<E>()
    }
}

impl<E, M> MatcherBase for AnyhowDowncastTo<E, M> {}

impl<E, M> Matcher<&anyhow::Error> for AnyhowDowncastTo<E, M>
where
    E: Copy + Display + Debug + Send + Sync + 'static,
    M: Matcher<E>,
{
    fn matches(&self, actual: &anyhow::Error) -> MatcherResult {
        actual
            .downcast_ref::<E>()
            .map(|v| self.inner.matches(*v))
            .unwrap_or(MatcherResult::NoMatch)
    }

    fn explain_match(&self, actual: &anyhow::Error) -> Description {
        match actual.downcast_ref::<E>() {
            Some(e) => Description::new()
                .text(format!(
                    "which is of the expected concrete error type {}",
                    Self::type_name()
                ))
                .text("with value")
                .nested(self.inner.explain_match(*e)),
            None => Description::new().text(format!(
                "which is not the expected concrete error type {}, error chain: {:#}",
                Self::type_name(),
                actual,
            )),
        }
    }

    fn describe(&self, matcher_result: MatcherResult) -> Description {
        match matcher_result {
            MatcherResult::Match => format!(
                "is of concrete error type {} with value which {}",
                Self::type_name(),
                self.inner.describe(MatcherResult::Match)
            )
            .into(),
            MatcherResult::NoMatch => format!(
                "is or is not a concrete error type {} with value which {}",
                Self::type_name(),
                self.inner.describe(MatcherResult::NoMatch)
            )
            .into(),
        }
    }
}

/// Builds a single channel image from rows of luma values. All rows must have
/// the same length.
pub fn luma_image(rows: &[&[u8]]) -> image::GrayImage {
    let height = rows.len() as u32;
    let width = rows.first().map(|row| row.len()).unwrap_or(0) as u32;
    image::GrayImage::from_fn(width, height, |x, y| {
        image::Luma([rows[y as usize][x as usize]])
    })
}

/// Returns the luma values of `img` as rows, for comparison against the input
/// to [luma_image].
pub fn luma_rows(img: &image::GrayImage) -> Vec<Vec<u8>> {
    img.rows()
        .map(|row| row.map(|pixel| pixel.0[0]).collect())
        .collect()
}
