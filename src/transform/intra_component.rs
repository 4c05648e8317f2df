use std::borrow::Cow;
use crate::util::{is_stylesheet, relative_specifier};
use super::{RewritePass, TransformContext, rewrite_imports};

/// Points relative imports between files of the same multi-file unit at
/// their flattened targets.
///
/// Imports of files the unit does not list are left alone, so a registry
/// author can keep a sibling out of the install on purpose.
pub struct IntraComponentPass;

impl RewritePass for IntraComponentPass {
    fn name(&self) -> &'static str {
        "intra-component"
    }

    fn rewrite<'c>(&self, content: &'c str, ctx: &TransformContext<'_>) -> Cow<'c, str> {
        if !ctx.unit.is_multi_file() {
            return Cow::Borrowed(content);
        }
        rewrite_imports(content, |import| {
            if !import.is_relative() || is_stylesheet(import.specifier) {
                return None;
            }
            let target = ctx.sibling(import.specifier)?;
            Some(relative_specifier(&ctx.file.target_path, &target.target_path))
        })
    }
}
