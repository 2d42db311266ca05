//! HTML minification through `minify-html`.

use std::string::FromUtf8Error;

use minify_html::Cfg;
use stagehand_core::MinifierOptions;

/// `minify-html` settings for the rendered page. Closing tags and the
/// `<html>` / `<head>` opening tags are always kept.
pub fn minifier_cfg(options: &MinifierOptions) -> Cfg {
    let mut cfg = Cfg::new();
    cfg.keep_closing_tags = true;
    cfg.keep_html_and_head_opening_tags = true;
    cfg.keep_comments = !options.remove_comments;
    cfg.minify_css = options.minify_css;
    cfg.minify_js = options.minify_js;
    cfg.remove_bangs = true;
    cfg.remove_processing_instructions = true;
    cfg
}

pub fn minify_html(html: &str, options: &MinifierOptions) -> Result<String, FromUtf8Error> {
    let cfg = minifier_cfg(options);
    let mut out = minify_html::minify(html.as_bytes(), &cfg);
    if options.remove_comments {
        // whitespace left on both sides of a dropped comment merges on this pass
        out = minify_html::minify(&out, &cfg);
    }
    String::from_utf8(out)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn full() -> MinifierOptions {
        MinifierOptions::default()
    }

    #[test]
    fn removes_comments_and_block_whitespace() {
        let html = "<div>\n  <!-- nav -->\n  <p>Hello</p>\n</div>\n";
        let out = minify_html(html, &full()).unwrap();
        assert!(!out.contains("<!--"));
        assert!(!out.contains('\n'));
        assert!(out.contains("<p>Hello</p>"));
    }

    #[test]
    fn comment_between_inline_elements_leaves_one_space() {
        let html = "<p><span>a</span>\n  <!-- note -->\n  <span>b</span></p>";
        let out = minify_html(html, &full()).unwrap();
        assert!(!out.contains("<!--"));
        assert!(!out.contains("  "), "{out:?}");
        assert!(out.contains("<span>a</span> <span>b</span>"), "{out:?}");
    }

    #[test]
    fn collapses_runs_inside_text() {
        let out = minify_html("<p>one   two\n\tthree</p>", &full()).unwrap();
        assert!(out.contains("<p>one two three</p>"), "{out:?}");
    }

    #[test]
    fn pre_content_untouched() {
        let html = "<pre>  keep\n   this  </pre>";
        let out = minify_html(html, &full()).unwrap();
        assert!(out.contains("<pre>  keep\n   this  </pre>"), "{out:?}");
    }

    #[test]
    fn comments_kept_when_disabled() {
        let options = MinifierOptions {
            remove_comments: false,
            ..full()
        };
        let out = minify_html("<div>\n  <!-- keep -->\n</div>", &options).unwrap();
        assert!(out.contains("<!-- keep -->"), "{out:?}");
    }

    #[test]
    fn config_maps_options() {
        let cfg = minifier_cfg(&MinifierOptions {
            remove_comments: false,
            minify_css: false,
            minify_js: true,
        });
        assert!(cfg.keep_comments);
        assert!(!cfg.minify_css);
        assert!(cfg.minify_js);
        assert!(cfg.keep_closing_tags);
    }
}
