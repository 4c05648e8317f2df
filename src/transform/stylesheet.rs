use std::borrow::Cow;
use crate::util::{is_stylesheet, relative_specifier};
use super::{RewritePass, TransformContext, rewrite_imports};

/// Rewrites imports of the unit's own stylesheets to their flattened targets.
/// Stylesheets the unit does not list keep their original path.
pub struct StylesheetPass;

impl RewritePass for StylesheetPass {
    fn name(&self) -> &'static str {
        "stylesheet"
    }

    fn rewrite<'c>(&self, content: &'c str, ctx: &TransformContext<'_>) -> Cow<'c, str> {
        rewrite_imports(content, |import| {
            if !import.is_relative() || !is_stylesheet(import.specifier) {
                return None;
            }
            let target = ctx.sibling(import.specifier)?;
            Some(relative_specifier(&ctx.file.target_path, &target.target_path))
        })
    }
}
