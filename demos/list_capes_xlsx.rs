use ckan_xlsx::{Client, FormatFilter, Result};
use std::time::Duration;

fn main() -> Result<()> {
    // Lists the XLSX files of one CAPES dataset without downloading them.
    let client = Client::new("https://dadosabertos.capes.gov.br", Duration::from_secs(60))?;
    let package = client.package_show("36d1c92c-f9e0-4da1-a4f0-633e6ebefe03")?;

    let filter = FormatFilter::xlsx();
    for r in package.resources.iter().filter(|r| filter.matches(r)) {
        println!("{}\n  {}", r.display_name(), r.effective_url());
    }
    Ok(())
}
