//! Template icon discovery.

use log::debug;

use crate::repository::Checkout;
use crate::source::{RepositoryDescriptor, DRIVER_GITHUB, DRIVER_GITLAB};

/// Icon file names, in lookup order.
pub const ICON_FILES: [&str; 4] = ["icon.png", "icon.jpg", "icon.jpeg", "icon.svg"];

const GITHUB_RAW_HOST: &str = "raw.githubusercontent.com";
const GITLAB_RAW_HOST: &str = "gitlab.com";

/// Finds the template's icon, returning its path relative to the repository
/// root.
///
/// The subpath directory is searched before the root; within a directory the
/// first name in [`ICON_FILES`] that exists wins.
pub fn find_icon(checkout: &Checkout) -> Option<String> {
    let mut prefixes = Vec::with_capacity(2);
    if let Some(subpath) = checkout.subpath() {
        prefixes.push(format!("{}/", subpath));
    }
    prefixes.push(String::new());

    prefixes.iter().find_map(|prefix| {
        ICON_FILES.iter().find_map(|file| {
            let relative = format!("{}{}", prefix, file);
            checkout.root().join(&relative).is_file().then_some(relative)
        })
    })
}

/// Builds the URL under which `file` can be downloaded.
///
/// github.com and gitlab.com get their raw-file URLs at `reference`, or
/// `HEAD` when none is given. Other hosts get the relative path unchanged.
pub fn icon_url(repo: &RepositoryDescriptor, file: &str, reference: Option<&str>) -> String {
    let reference = reference.filter(|r| !r.is_empty()).unwrap_or("HEAD");
    match repo.driver.as_str() {
        DRIVER_GITHUB => format!(
            "https://{}/{}/{}/{}/{}",
            GITHUB_RAW_HOST, repo.namespace, repo.name, reference, file
        ),
        DRIVER_GITLAB => format!(
            "https://{}/{}/{}/-/raw/{}/{}",
            GITLAB_RAW_HOST, repo.namespace, repo.name, reference, file
        ),
        _ => file.to_string(),
    }
}

/// Resolves the stored icon value for a checkout; empty when there is none.
pub fn resolve_icon(repo: &RepositoryDescriptor, checkout: &Checkout, reference: Option<&str>) -> String {
    match find_icon(checkout) {
        Some(file) => {
            debug!("Found icon {} for {}/{}", file, repo.namespace, repo.name);
            icon_url(repo, &file, reference)
        }
        None => String::new(),
    }
}
