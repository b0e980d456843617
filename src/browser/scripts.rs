// Copyright (c) 2026 Bountyy Oy. All rights reserved.
// This software is proprietary and confidential.

//! JavaScript evaluated in the inspected page
//!
//! Scripts that return structured data return plain JSON-compatible values
//! so they can be deserialized straight into Rust types.

/// Absolute XPath of an element, one `[n]` index per step
macro_rules! xpath_helper {
    () => {
        r#"
    const xpathOf = (el) => {
        const steps = [];
        const XHTML = 'http://www.w3.org/1999/xhtml';
        for (let node = el; node && node.nodeType === Node.ELEMENT_NODE; node = node.parentNode) {
            // Unprefixed name tests only match HTML elements (not inline SVG or MathML)
            const foreign = node.namespaceURI !== XHTML;
            let index = 1;
            for (let sib = node.previousElementSibling; sib; sib = sib.previousElementSibling) {
                if (sib.localName !== node.localName) continue;
                if (foreign || sib.namespaceURI === XHTML) index++;
            }
            const name = foreign ? "*[local-name()='" + node.localName + "']" : node.localName;
            steps.unshift(name + '[' + index + ']');
        }
        return '/' + steps.join('/');
    };
"#
    };
}

/// Space-joined text of every visible, non-empty text node under `body`
pub const VISIBLE_TEXT_SCRIPT: &str = r#"
(function visibleText() {
    if (!document.body) return '';

    const isVisible = (element) => !element || typeof element.checkVisibility !== 'function' ||
        element.checkVisibility({
            opacityProperty: true,
            visibilityProperty: true,
            contentVisibilityAuto: true
        });

    const iterator = document.createNodeIterator(document.body, NodeFilter.SHOW_TEXT, {
        acceptNode(node) {
            if (!isVisible(node.parentElement)) return NodeFilter.FILTER_REJECT;
            if (node.textContent.trim().length === 0) return NodeFilter.FILTER_REJECT;
            return NodeFilter.FILTER_ACCEPT;
        }
    });

    const parts = [];
    let node;
    while ((node = iterator.nextNode())) {
        parts.push(node.textContent.trim());
    }
    return parts.join(' ');
})()
"#;

/// Every `a[href]` as `{href, class, text}`; `href` is the resolved property
pub const LINKS_SCRIPT: &str = r#"
(function links() {
    return Array.from(document.querySelectorAll('a[href]')).map((a) => ({
        href: a.getAttribute('href') ? a.href : '',
        class: a.getAttribute('class') || '',
        text: a.textContent || ''
    }));
})()
"#;

/// Direct children of `head`: link rel/href, meta name/content, title text
pub const HEAD_SCRIPT: &str = r#"
(function head() {
    const out = { links: [], metas: [], titles: [] };
    if (!document.head) return out;

    for (const child of document.head.children) {
        switch (child.nodeName) {
            case 'LINK':
                out.links.push({ rel: child.rel || '', href: child.href || '' });
                break;
            case 'META':
                out.metas.push({ name: child.name || '', content: child.content || '' });
                break;
            case 'TITLE':
                out.titles.push(child.textContent || '');
                break;
        }
    }
    return out;
})()
"#;

/// Favicon URL: first `link[rel~=icon]`, else `/favicon.ico` on the origin
pub const FAVICON_URL_SCRIPT: &str = r#"
(function faviconUrl() {
    const link = document.querySelector('link[rel~="icon"]');
    if (link && link.href) return link.href;
    return window.location.origin + '/favicon.ico';
})()
"#;

/// Snapshot of every form, its fields and every label in the document
pub const FORM_SNAPSHOT_SCRIPT: &str = concat!(
    "(function formSnapshot() {",
    xpath_helper!(),
    r#"
    const prop = (el, name) => {
        const value = el[name];
        if (typeof value === 'string') return value;
        return el.getAttribute(name) || '';
    };

    const labels = Array.from(document.querySelectorAll('label')).map((label) => ({
        for: label.getAttribute('for') || '',
        text: label.textContent || ''
    }));

    const forms = Array.from(document.querySelectorAll('form')).map((form) => ({
        action: prop(form, 'action'),
        method: prop(form, 'method'),
        class: form.getAttribute('class') || '',
        id: form.getAttribute('id') || '',
        xpath: xpathOf(form),
        inputs: Array.from(form.querySelectorAll('input, textarea, select')).map((input) => {
            const enclosing = input.closest('label');
            return {
                class: input.getAttribute('class') || '',
                id: input.getAttribute('id') || '',
                placeholder: input.getAttribute('placeholder') || '',
                name: input.getAttribute('name') || '',
                type: prop(input, 'type'),
                value: typeof input.value === 'string' ? input.value : '',
                xpath: xpathOf(input),
                enclosing_label: enclosing ? enclosing.textContent : null
            };
        })
    }));

    return { forms, labels };
})()
"#
);

/// XPaths of leaf elements that are safe to click while probing the clipboard
pub const LEAF_NODES_SCRIPT: &str = concat!(
    "(function leafNodes() {",
    xpath_helper!(),
    r#"
    const selector = 'body *:not(:has(*)):not(script, style, a[href], a[href] *, option, svg *)';
    return Array.from(document.querySelectorAll(selector)).map(xpathOf);
})()
"#
);

/// Read the clipboard; resolves to an empty string on denial
pub const CLIPBOARD_READ_SCRIPT: &str = r#"
(async function readClipboard() {
    try {
        return await navigator.clipboard.readText();
    } catch (e) {
        return '';
    }
})()
"#;

/// Empty the clipboard
pub const CLIPBOARD_CLEAR_SCRIPT: &str = r#"
(async function clearClipboard() {
    try {
        await navigator.clipboard.writeText('');
        return true;
    } catch (e) {
        return false;
    }
})()
"#;

/// Ask for confirmation before any unload so clicks cannot navigate away
pub const NAVIGATION_LOCK_SCRIPT: &str = r#"
(function navigationLock() {
    if (window.__piscesNavLock) return true;
    window.__piscesNavLock = (event) => {
        event.preventDefault();
        event.returnValue = '';
        return '';
    };
    window.addEventListener('beforeunload', window.__piscesNavLock);
    return true;
})()
"#;

/// Remove the navigation lock
pub const NAVIGATION_UNLOCK_SCRIPT: &str = r#"
(function navigationUnlock() {
    if (!window.__piscesNavLock) return false;
    window.removeEventListener('beforeunload', window.__piscesNavLock);
    delete window.__piscesNavLock;
    return true;
})()
"#;

/// Submit the form owning `this` (a form or one of its controls)
pub const SUBMIT_FUNCTION: &str = r#"
function () {
    const form = this.nodeName === 'FORM' ? this : this.form;
    if (!form) return false;
    HTMLFormElement.prototype.submit.call(form);
    return true;
}
"#;

/// Expression that is `true` when the XPath resolves to a node
pub fn xpath_exists_script(xpath: &str) -> String {
    // JSON string literals are valid JavaScript string literals
    let literal = serde_json::Value::String(xpath.to_string()).to_string();
    format!(
        "document.evaluate({}, document, null, XPathResult.FIRST_ORDERED_NODE_TYPE, null).singleNodeValue !== null",
        literal
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_helper_is_spliced() {
        assert!(FORM_SNAPSHOT_SCRIPT.starts_with("(function formSnapshot() {"));
        assert!(FORM_SNAPSHOT_SCRIPT.contains("const xpathOf"));
        assert!(LEAF_NODES_SCRIPT.contains("const xpathOf"));
        assert!(LEAF_NODES_SCRIPT.contains("a[href] *"));
    }

    #[test]
    fn test_xpath_helper_handles_foreign_elements() {
        for script in [FORM_SNAPSHOT_SCRIPT, LEAF_NODES_SCRIPT] {
            assert!(script.contains("node.namespaceURI !== XHTML"));
            assert!(script.contains("*[local-name()='"));
        }
    }

    #[test]
    fn test_xpath_exists_escapes() {
        let script = xpath_exists_script("/html[1]/body[1]/form[\"x\"]");
        assert!(script.starts_with("document.evaluate(\"/html[1]/body[1]/form[\\\"x\\\"]\""));
    }
}
