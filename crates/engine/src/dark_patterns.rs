use crate::color::{delta_e, dominant_color};
use crate::discovery::{is_clickable, is_descendant};
use consentry_core::{
    AuditError, ColorDistance, DOCUMENT_ROOT, Dimensions, ElementsByRole, InteractiveElement, NodeInfo, Notice,
    PageDriver, Point, Role,
};
use tracing::{debug, info};

/// Counterparts of Accept, by priority
pub const COUNTERPART_ORDER: [Role; 3] = [Role::Reject, Role::SaveSettings, Role::Settings];

fn in_viewport(center: &Point, viewport: Dimensions) -> bool {
    center.x >= 0.0 && center.y >= 0.0 && center.x < viewport.width as f64 && center.y < viewport.height as f64
}

/// Clickable page elements outside the notice, spread evenly over document order.
pub fn forced_action_sample(nodes: Vec<NodeInfo>, notice: &Notice, viewport: Dimensions, cap: usize) -> Vec<NodeInfo> {
    let qualifying: Vec<NodeInfo> = nodes
        .into_iter()
        .filter(|n| {
            let center = n.rect.center();
            is_clickable(n)
                && n.rect.area() > 1.0
                && in_viewport(&center, viewport)
                && !notice.bounding_box.contains(&center)
                && n.locator != notice.locator
                && !is_descendant(&n.locator, &notice.locator)
        })
        .collect();

    if cap == 0 || qualifying.len() <= cap {
        return qualifying.into_iter().take(cap).collect();
    }
    let stride = qualifying.len() as f64 / cap as f64;
    (0..cap)
        .filter_map(|i| qualifying.get((i as f64 * stride) as usize).cloned())
        .collect()
}

/// Locators of sampled page elements whose click point the notice occludes.
pub async fn forced_action(page: &dyn PageDriver, notice: &Notice, cap: usize) -> Result<Vec<String>, AuditError> {
    let viewport = page.viewport().await?;
    let nodes = page.descendants(DOCUMENT_ROOT).await?;
    let sample = forced_action_sample(nodes, notice, viewport, cap);

    let mut unreachable = Vec::new();
    for node in &sample {
        if let Some(state) = page.element_state(&node.locator).await? {
            if state.covered {
                unreachable.push(node.locator.clone());
            }
        }
    }
    info!(sampled = sample.len(), unreachable = unreachable.len(), "forced action check done");
    Ok(unreachable)
}

/// First single-segment Accept and its highest-priority single-segment counterpart.
pub fn interference_pair(elements: &ElementsByRole) -> Option<(&InteractiveElement, &InteractiveElement)> {
    let accept = elements.first_single(Role::Accept)?;
    let counterpart = COUNTERPART_ORDER.iter().find_map(|&role| elements.first_single(role))?;
    Some((accept, counterpart))
}

/// `None` when either control has no counterpart or cannot be rendered.
pub async fn interface_interference(
    page: &dyn PageDriver,
    elements: &ElementsByRole,
    threshold: f64,
) -> Result<Option<ColorDistance>, AuditError> {
    let Some((accept, counterpart)) = interference_pair(elements) else {
        debug!("no accept/counterpart pair, skipping interference check");
        return Ok(None);
    };

    let (Some(accept_png), Some(counterpart_png)) = (
        page.capture(accept.last_locator()).await?,
        page.capture(counterpart.last_locator()).await?,
    ) else {
        info!("could not render accept/counterpart pair, skipping interference check");
        return Ok(None);
    };

    let accept_color = dominant_color(&accept_png)?;
    let counterpart_color = dominant_color(&counterpart_png)?;
    let distance = delta_e(accept_color, counterpart_color);

    Ok(Some(ColorDistance {
        accept_locator: accept.last_locator().to_string(),
        counterpart_locator: counterpart.last_locator().to_string(),
        counterpart_role: counterpart.role.unwrap_or(Role::Other),
        accept_color,
        counterpart_color,
        distance,
        violation: distance < threshold,
    }))
}
