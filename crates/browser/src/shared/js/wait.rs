pub const CHECK_LOADING: &str = r#"
() => ({
    readyState: document.readyState,
    loading: document.readyState !== 'complete',
    activeRequests: performance.getEntriesByType('resource').filter(r => !r.responseEnd).length
})
"#;

// Installs the observer on first use; a navigation drops it together with the document.
pub const MUTATION_COUNT: &str = r#"
() => {
    if (!window.__consentryMutations) {
        const state = { count: 0 };
        window.__consentryMutations = state;
        new MutationObserver((records) => { state.count += records.length; })
            .observe(document, { subtree: true, childList: true, attributes: true, characterData: true });
    }
    return window.__consentryMutations.count;
}
"#;
