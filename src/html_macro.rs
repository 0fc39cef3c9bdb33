// Copyright (c) 2025 Chatmark Project. All rights reserved.
// Released under the GPL-3.0 license as described in the file LICENSE.

/// Build an element: `html!(a href = {href}, class = "x" => (child) "text")`.
///
/// Attribute names have `_` mapped to `-` and values are attribute-escaped;
/// children are pushed as-is, so they must already be HTML.
#[macro_export]
macro_rules! html {
    ($tag:ident $($attr:ident = $value:expr),* => $($child:tt)*) => {{
        let mut element = String::new();
        element.push_str(concat!("<", stringify!($tag)));
        $(
            element.push(' ');
            element.push_str(&stringify!($attr).replace('_', "-"));
            element.push_str("=\"");
            element.push_str(&htmlize::escape_attribute(($value).to_string()));
            element.push('"');
        )*
        element.push('>');
        $(
            element.push_str(&($child).to_string());
        )*
        element.push_str(concat!("</", stringify!($tag), ">"));
        element
    }};
}

#[cfg(test)]
mod tests {
    #[test]
    fn test_html_macro() {
        let href = "https://example.com/?a=1&b=\"2\"";
        let text = "link";
        assert_eq!(
            html!(a href = {href}, data_kind = "x" => {text} " " ("<b>!</b>")),
            r#"<a href="https://example.com/?a=1&amp;b=&quot;2&quot;" data-kind="x">link <b>!</b></a>"#
        );
        assert_eq!(html!(p =>), "<p></p>");
    }
}
