//! JavaScript snippets run through [`super::BrowserSession::execute`].
//! Each is a function body; its `return` value comes back as JSON.

pub const READY_STATE: &str = "return document.readyState;";

pub const SCROLL_HEIGHT: &str = "return document.body ? document.body.scrollHeight : 0;";

pub const SCROLL_TO_BOTTOM: &str =
    "window.scrollTo(0, document.body ? document.body.scrollHeight : 0); return null;";

/// Flattened pre-order element tree under `<body>`, one entry per element:
/// `{ tag, parent, text }`. `parent` is the index of the parent entry (null
/// for the body), `text` is the text content of childless elements only.
/// `null` when the document has no body.
pub const DOM_SNAPSHOT: &str = r#"
    if (!document.body) { return null; }
    const nodes = [];
    const stack = [[document.body, null]];
    while (stack.length > 0) {
        const [el, parent] = stack.pop();
        const index = nodes.length;
        const kids = el.children;
        nodes.push({
            tag: el.tagName.toLowerCase(),
            parent: parent,
            text: kids.length === 0 ? (el.textContent || '') : null
        });
        for (let i = kids.length - 1; i >= 0; i--) { stack.push([kids[i], index]); }
    }
    return nodes;
"#;
