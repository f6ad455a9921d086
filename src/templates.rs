//! Sample SVG templates for testing and demonstration.
//!
//! Each template exercises a different placeholder layout.

/// Name badge: one block with a `name` text field and a `code` QR field.
pub fn badge_template() -> &'static str {
    r##"<?xml version="1.0" encoding="UTF-8"?>
<svg xmlns="http://www.w3.org/2000/svg"
     xmlns:sodipodi="http://sodipodi.sourceforge.net/DTD/sodipodi-0.dtd"
     xmlns:inkscape="http://www.inkscape.org/namespaces/inkscape"
     width="200mm" height="100mm" viewBox="0 0 200 100">
  <sodipodi:namedview id="base" inkscape:document-units="mm"/>
  <g class="template" inkscape:label="badge">
    <rect x="0" y="0" width="200" height="100" fill="none" stroke="#333"/>
    <text x="10" y="40" font-size="12"><tspan class="name">Name</tspan></text>
    <text x="10" y="60" font-size="6"><tspan class="title">Title</tspan></text>
    <rect class="code" x="120" y="10" width="60" height="60" fill="#ccc"/>
  </g>
</svg>
"##
}

/// Two labels per page, text only.
pub fn two_up_template() -> &'static str {
    r##"<?xml version="1.0" encoding="UTF-8"?>
<svg xmlns="http://www.w3.org/2000/svg" width="210mm" height="297mm" viewBox="0 0 210 297">
  <g class="template" transform="translate(10,10)">
    <text x="0" y="20"><tspan class="name">Name</tspan></text>
  </g>
  <g class="template" transform="translate(10,150)">
    <text x="0" y="20"><tspan class="name">Name</tspan></text>
  </g>
</svg>
"##
}

/// QR placeholder carrying its own transform.
pub fn rotated_code_template() -> &'static str {
    r##"<?xml version="1.0" encoding="UTF-8"?>
<svg xmlns="http://www.w3.org/2000/svg" width="100mm" height="100mm" viewBox="0 0 100 100">
  <g class="template">
    <rect class="code" x="20" y="-80" width="60" height="60" transform="rotate(90)"/>
  </g>
</svg>
"##
}

/// Static artwork with placeholders but no repeatable block.
pub fn no_blocks_template() -> &'static str {
    r##"<?xml version="1.0" encoding="UTF-8"?>
<svg xmlns="http://www.w3.org/2000/svg" width="100mm" height="100mm">
  <text x="10" y="20"><tspan class="name">Name</tspan></text>
</svg>
"##
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn templates_are_valid_svg() {
        let templates: Vec<(&str, &str)> = vec![
            ("badge", badge_template()),
            ("two_up", two_up_template()),
            ("rotated_code", rotated_code_template()),
            ("no_blocks", no_blocks_template()),
        ];

        for (name, svg) in templates {
            let doc = crate::dom::parse_svg(svg)
                .unwrap_or_else(|e| panic!("Template '{name}' should parse: {e}"));
            assert!(doc.root.is_svg("svg"), "Template '{name}' root should be <svg>");
        }
    }
}
