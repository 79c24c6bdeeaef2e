use std::sync::OnceLock;
use tera::{Context, Tera};

use crate::models::ReviewJob;
use crate::report::{ReportError, ReportView};

static TERA: OnceLock<Tera> = OnceLock::new();

const REPORT_TEMPLATE: &str = r#"<!DOCTYPE html>
<html lang="en">
<head>
  <meta charset="UTF-8">
  <meta name="viewport" content="width=device-width, initial-scale=1.0">
  <title>{{ view.title }}</title>
  <style>
    body { font-family: sans-serif; line-height: 1.6; padding: 20px; background-color: #f4f4f4; color: #333; }
    .container { max-width: 800px; margin: auto; background: #fff; padding: 20px; border-radius: 8px; box-shadow: 0 0 10px rgba(0,0,0,0.1); }
    h1, h2 { color: #444; }
    pre { white-space: pre-wrap; background: #eee; padding: 10px; border-radius: 5px; }
    a { color: #0066cc; }
    ul { padding-left: 20px; }
  </style>
</head>
<body>
  <div class="container">
    <h1>{{ view.title }}</h1>
    <p>{{ view.byline }}</p>
    <hr>
    <h2>Review Report</h2>
    <pre>{{ view.report }}</pre>
{%- if view.sources %}
    <h2>Sources:</h2>
    <ul>
{%- for source in view.sources %}
      <li><a href="{{ source.uri }}" target="_blank" rel="noopener noreferrer">{{ source.label }}</a></li>
{%- endfor %}
    </ul>
{%- endif %}
  </div>
</body>
</html>
"#;

/// Templates are compiled in; `.html` names keep Tera's autoescaping on.
pub fn get_tera() -> Result<&'static Tera, tera::Error> {
    if let Some(tera) = TERA.get() {
        return Ok(tera);
    }
    let mut tera = Tera::default();
    tera.add_raw_template("report.html", REPORT_TEMPLATE)?;
    Ok(TERA.get_or_init(|| tera))
}

pub fn render_html(job: &ReviewJob) -> Result<Vec<u8>, ReportError> {
    let view = ReportView::from_job(job)?;
    let mut ctx = Context::new();
    ctx.insert("view", &view);
    let rendered = get_tera()?.render("report.html", &ctx)?;
    Ok(rendered.into_bytes())
}
