// Locators are structural paths: `tag:nth-of-type(n)` segments joined by ` > `,
// relative to the containing root. Crossing into an open shadow root is written
// as ` >>> ` after the host's locator.
macro_rules! locator_helpers {
    () => {
        r#"
    const resolveLocator = (locator) => {
        const hops = locator.split(' >>> ');
        let scope = document;
        let el = null;
        for (const hop of hops) {
            if (!scope) return null;
            try { el = scope.querySelector(hop); } catch (e) { return null; }
            if (!el) return null;
            scope = el.shadowRoot;
        }
        return el;
    };
    const locatorOf = (el) => {
        const parts = [];
        let node = el;
        while (node) {
            const parent = node.parentNode;
            const tag = node.tagName.toLowerCase();
            if (!parent || parent.nodeType === 9) {
                parts.unshift(tag);
                break;
            }
            const idx = Array.from(parent.children).filter(c => c.tagName === node.tagName).indexOf(node) + 1;
            parts.unshift(tag + ':nth-of-type(' + idx + ')');
            if (parent.nodeType === 11) return locatorOf(parent.host) + ' >>> ' + parts.join(' > ');
            node = parent;
        }
        return parts.join(' > ');
    };
    const isVisible = (el) => {
        const rect = el.getBoundingClientRect();
        const style = window.getComputedStyle(el);
        return rect.width > 0 && rect.height > 0 &&
            style.visibility !== 'hidden' && style.display !== 'none' && style.opacity !== '0';
    };
    const composedContains = (outer, inner) => {
        let node = inner;
        while (node) {
            if (node === outer) return true;
            node = node.parentNode || node.host || null;
        }
        return false;
    };
    const topmostAt = (x, y) => {
        let top = document.elementFromPoint(x, y);
        while (top && top.shadowRoot) {
            const inner = top.shadowRoot.elementFromPoint(x, y);
            if (!inner || inner === top) break;
            top = inner;
        }
        return top;
    };
"#
    };
}

pub const ELEMENT_STATE: &str = concat!(
    "(locator) => {",
    locator_helpers!(),
    r#"
    const el = resolveLocator(locator);
    if (!el) return null;

    const rect = el.getBoundingClientRect();
    const top = topmostAt(rect.left + rect.width / 2, rect.top + rect.height / 2);

    return {
        locator: locatorOf(el),
        visible: isVisible(el),
        covered: !top || !composedContains(el, top),
        rect: { x: rect.left, y: rect.top, width: rect.width, height: rect.height },
        tagName: el.tagName.toLowerCase(),
        href: el.getAttribute('href'),
        target: el.getAttribute('target')
    };
}"#
);

pub const DESCENDANTS: &str = concat!(
    "(rootLocator) => {",
    locator_helpers!(),
    r#"
    const root = resolveLocator(rootLocator);
    if (!root) return null;

    const clickableRoles = ['button', 'link', 'menuitem', 'checkbox', 'switch', 'tab', 'option'];
    const out = [];
    const visit = (el) => {
        const rect = el.getBoundingClientRect();
        const style = window.getComputedStyle(el);
        const tag = el.tagName.toLowerCase();
        const text = (el.innerText || el.value || el.getAttribute('aria-label') || el.getAttribute('title') || '')
            .toString().trim().replace(/\s+/g, ' ');
        const nativeClick = tag === 'button' || (tag === 'a' && el.hasAttribute('href')) ||
            (tag === 'input' && ['button', 'submit', 'checkbox', 'radio'].includes(el.type));
        out.push({
            locator: locatorOf(el),
            tagName: tag,
            text,
            rect: { x: rect.left, y: rect.top, width: rect.width, height: rect.height },
            visible: isVisible(el),
            hasRole: clickableRoles.includes((el.getAttribute('role') || '').toLowerCase()),
            hasClickHandler: nativeClick || typeof el.onclick === 'function' || el.hasAttribute('onclick'),
            pointerCursor: style.cursor === 'pointer',
            href: el.getAttribute('href'),
            target: el.getAttribute('target')
        });
    };
    const walk = (node) => {
        for (const child of node.children) {
            visit(child);
            walk(child);
            if (child.shadowRoot) walk(child.shadowRoot);
        }
    };
    walk(root);
    if (root.shadowRoot) walk(root.shadowRoot);
    return out;
}"#
);

pub const FOOTPRINT: &str = concat!(
    "(locator) => {",
    locator_helpers!(),
    r#"
    const root = resolveLocator(locator);
    if (!root) return null;

    const texts = [];
    const hidden = (el) => {
        const style = window.getComputedStyle(el);
        return style.display === 'none' || style.visibility === 'hidden' || el.getClientRects().length === 0;
    };
    const walker = document.createTreeWalker(root, NodeFilter.SHOW_TEXT);
    while (walker.nextNode()) {
        const node = walker.currentNode;
        const value = node.nodeValue.trim();
        if (!value || !node.parentElement || hidden(node.parentElement)) continue;
        texts.push(value);
    }
    return { texts, width: root.clientWidth, height: root.clientHeight };
}"#
);

pub const CLICK: &str = concat!(
    "(locator) => {",
    locator_helpers!(),
    r#"
    const el = resolveLocator(locator);
    if (el) {
        el.click();
        return ['SUCCESS'];
    }

    // same-origin frames get a chance before the main frame reports a wrong selector
    const statuses = [];
    for (const frame of Array.from(document.querySelectorAll('iframe'))) {
        let doc = null;
        try { doc = frame.contentDocument; } catch (e) { doc = null; }
        if (!doc) continue;
        let inner = null;
        try { inner = doc.querySelector(locator.split(' >>> ')[0]); } catch (e) { inner = null; }
        if (inner) {
            inner.click();
            statuses.push('SUCCESS');
        } else {
            statuses.push('NOT_APPLICABLE');
        }
    }
    if (!statuses.includes('SUCCESS')) statuses.unshift('WRONG_SELECTOR');
    return statuses;
}"#
);

pub const CAPTURE_RECT: &str = concat!(
    "(locator) => {",
    locator_helpers!(),
    r#"
    const el = resolveLocator(locator);
    if (!el || !isVisible(el)) return null;
    el.scrollIntoView({ block: 'center', inline: 'center' });
    const rect = el.getBoundingClientRect();
    return { x: rect.left + window.scrollX, y: rect.top + window.scrollY, width: rect.width, height: rect.height };
}"#
);

pub const VIEWPORT: &str = r#"
() => ({ width: window.innerWidth, height: window.innerHeight })
"#;
