/// Layers that can host a consent notice: fixed or sticky boxes, dialogs, and
/// anything whose id or class mentions cookies or consent.
pub const OVERLAY_CANDIDATES: &str = r#"
() => {
    const selectors = [
        '[class*="cookie"]', '[id*="cookie"]',
        '[class*="consent"]', '[id*="consent"]',
        '[class*="gdpr"]', '[id*="gdpr"]',
        '[role="dialog"]', '[aria-modal="true"]'
    ];
    const seen = new Set(Array.from(document.querySelectorAll(selectors.join(', '))));
    for (const el of Array.from(document.body ? document.body.querySelectorAll('*') : [])) {
        const position = window.getComputedStyle(el).position;
        if (position === 'fixed' || position === 'sticky') seen.add(el);
    }

    const locatorOf = (el) => {
        const parts = [];
        let node = el;
        while (node && node.parentNode && node.parentNode.nodeType === 1) {
            const parent = node.parentNode;
            const idx = Array.from(parent.children).filter(c => c.tagName === node.tagName).indexOf(node) + 1;
            parts.unshift(node.tagName.toLowerCase() + ':nth-of-type(' + idx + ')');
            node = parent;
        }
        parts.unshift('html');
        return parts.join(' > ');
    };

    const out = [];
    for (const el of seen) {
        const rect = el.getBoundingClientRect();
        const style = window.getComputedStyle(el);
        if (rect.width <= 0 || rect.height <= 0 || style.visibility === 'hidden' || style.display === 'none') continue;
        out.push({
            locator: locatorOf(el),
            text: (el.innerText || '').trim().replace(/\s+/g, ' ').slice(0, 4000),
            rect: { x: rect.left, y: rect.top, width: rect.width, height: rect.height },
            zIndex: parseInt(style.zIndex, 10) || 0,
            position: style.position
        });
    }
    return out;
}
"#;
