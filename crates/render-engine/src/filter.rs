//! Filter-graph assembly.
//!
//! Builds the ordered list of named-stream statements the compositing
//! engine consumes as a filter script. Input indices are fixed by the
//! invocation convention: `0` display video, `1` camera video, `2`
//! audio, `3..` the pointer glyph catalog in index order.
//!
//! Stage order (a strict DAG, each stream name produced exactly once):
//!
//! 1. scale the camera and apply the configured shape as an analytic
//!    per-pixel alpha mask (`geq`);
//! 2. synthesize a soft drop shadow behind the shaped camera (split,
//!    blacken, blur, offset under the original);
//! 3. overlay the camera onto the display frame at the anchor position;
//! 4. normalize every pointer glyph to a padded square cell with the
//!    same shadow treatment at a smaller offset;
//! 5. stack all cells into one vertical atlas;
//! 6. crop one cell out of the atlas at `(id expression) * cell` per
//!    frame;
//! 7. overlay the cropped cursor at the compiled x/y expressions, with
//!    the optional subtitle burn-in chained onto the same statement.

use std::path::Path;

use castweld_common::error::CastweldResult;
use castweld_project_model::project::POINTER_GLYPH_COUNT;
use castweld_project_model::settings::{CameraShape, RenderSettings};

/// Camera drop shadow: offset down-and-right, blur radius.
const CAMERA_SHADOW_OFFSET: u32 = 6;
const CAMERA_SHADOW_SIGMA: u32 = 6;

/// Glyph cell shadow, smaller than the camera's.
const GLYPH_SHADOW_OFFSET: u32 = 2;
const GLYPH_SHADOW_SIGMA: u32 = 2;

/// Shadow opacity multiplier applied to the duplicated stream's alpha.
const SHADOW_OPACITY: f64 = 0.5;

/// Corner radius for the rounded-rectangle camera mask, in pixels.
const ROUNDED_CORNER_RADIUS: u32 = 20;

/// An assembled filter graph, one statement per named-stream operation.
#[derive(Debug, Clone)]
pub struct FilterGraph {
    statements: Vec<String>,
}

impl FilterGraph {
    /// Assemble the full graph. The expression arguments are compiled
    /// piecewise expressions; `caption_file` chains a subtitle burn-in
    /// onto the final overlay when present.
    pub fn assemble(
        settings: &RenderSettings,
        x_expr: &str,
        y_expr: &str,
        id_expr: &str,
        caption_file: Option<&Path>,
    ) -> Self {
        let mut statements = Vec::new();
        let cam = &settings.camera;
        let (w, h) = (cam.width, cam.height);

        statements.push(format!(
            "[1:v] scale={w}:{h}, format=rgba [cam_scaled];"
        ));
        statements.push(camera_mask_statement(cam.shape, w, h));
        push_shadow_chain(
            &mut statements,
            "cam_shaped",
            "cam",
            "cam_",
            CAMERA_SHADOW_OFFSET,
            CAMERA_SHADOW_SIGMA,
        );

        let (ox, oy) = cam.anchor.overlay_expr(cam.margin_x, cam.margin_y);
        statements.push(format!("[0:v][cam] overlay={ox}:{oy} [bg];"));

        let glyph = settings.cursor_size;
        for i in 0..POINTER_GLYPH_COUNT {
            statements.push(format!(
                "[{input}:v] scale={glyph}:{glyph}:force_original_aspect_ratio=decrease, \
                 pad={glyph}:{glyph}:(ow-iw)/2:(oh-ih)/2:color=black@0, format=rgba [g{i}];",
                input = i + 3,
            ));
            push_shadow_chain(
                &mut statements,
                &format!("g{i}"),
                &format!("cell{i}"),
                &format!("g{i}"),
                GLYPH_SHADOW_OFFSET,
                GLYPH_SHADOW_SIGMA,
            );
        }

        let cells: String = (0..POINTER_GLYPH_COUNT)
            .map(|i| format!("[cell{i}]"))
            .collect();
        statements.push(format!(
            "{cells} vstack=inputs={POINTER_GLYPH_COUNT} [atlas];"
        ));

        // Shadow padding grows each cell, so the crop window must too.
        let cell = glyph + GLYPH_SHADOW_OFFSET;
        statements.push(format!(
            "[atlas] crop={cell}:{cell}:0:'({id_expr})*{cell}' [cursor];"
        ));

        let caption_suffix = match caption_file {
            Some(path) => format!(", subtitles='{}'", escape_filter_path(path)),
            None => String::new(),
        };
        statements.push(format!(
            "[bg][cursor] overlay=x='{x_expr}':y='{y_expr}':eval=frame{caption_suffix} [outv];"
        ));

        Self { statements }
    }

    pub fn statements(&self) -> &[String] {
        &self.statements
    }

    /// The statement list as a filter-script file body.
    pub fn script(&self) -> String {
        self.statements.join("\n")
    }

    /// Name of the final video stream, for the `-map` directive.
    pub fn output_label(&self) -> &'static str {
        "outv"
    }

    pub fn write_script(&self, path: &Path) -> CastweldResult<()> {
        std::fs::write(path, self.script())?;
        Ok(())
    }
}

/// The shape mask over the scaled camera. Rectangle passes through
/// unchanged; circle and rounded-rectangle compute per-pixel alpha from
/// a distance test evaluated by the engine itself.
fn camera_mask_statement(shape: CameraShape, w: u32, h: u32) -> String {
    let cx = w as f64 / 2.0;
    let cy = h as f64 / 2.0;
    match shape {
        CameraShape::Rectangle => "[cam_scaled] null [cam_shaped];".to_string(),
        CameraShape::Circle => {
            let r = (w.min(h) as f64) / 2.0;
            format!(
                "[cam_scaled] geq=lum='p(X,Y)':a='if(lte(pow(X-{cx},2)+pow(Y-{cy},2),{r2}),255,0)' [cam_shaped];",
                r2 = r * r,
            )
        }
        CameraShape::Rounded => {
            let rad = ROUNDED_CORNER_RADIUS as f64;
            format!(
                "[cam_scaled] geq=lum='p(X,Y)':a='if(lte(pow(max(0,abs(X-{cx})-{ix}),2)+pow(max(0,abs(Y-{cy})-{iy}),2),{r2}),255,0)' [cam_shaped];",
                ix = cx - rad,
                iy = cy - rad,
                r2 = rad * rad,
            )
        }
    }
}

/// Duplicate `src`, turn the copy into a blurred half-transparent black
/// silhouette, shift it down-and-right by `offset`, and composite the
/// original back on top. `format=auto` keeps the alpha plane intact for
/// the downstream overlay.
fn push_shadow_chain(
    statements: &mut Vec<String>,
    src: &str,
    out: &str,
    prefix: &str,
    offset: u32,
    sigma: u32,
) {
    statements.push(format!("[{src}] split=2 [{prefix}fg][{prefix}dup];"));
    statements.push(format!(
        "[{prefix}dup] colorchannelmixer=rr=0:gg=0:bb=0:aa={SHADOW_OPACITY}, gblur=sigma={sigma} [{prefix}dark];"
    ));
    statements.push(format!(
        "[{prefix}dark] pad=iw+{offset}:ih+{offset}:{offset}:{offset}:color=black@0 [{prefix}shadow];"
    ));
    statements.push(format!(
        "[{prefix}shadow][{prefix}fg] overlay=0:0:format=auto [{out}];"
    ));
}

/// Escape a path for embedding inside a quoted filter argument.
/// Backslashes must be doubled before colons gain their escape, or the
/// added escapes would themselves be re-escaped.
pub fn escape_filter_path(path: &Path) -> String {
    path.to_string_lossy()
        .replace('\\', "\\\\")
        .replace(':', "\\:")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::expr::PiecewiseExpr;
    use std::path::PathBuf;

    fn assemble_default(caption: Option<&Path>) -> FilterGraph {
        FilterGraph::assemble(&RenderSettings::default(), "X", "Y", "ID", caption)
    }

    #[test]
    fn test_stage_statements_for_default_settings() {
        let graph = assemble_default(None);
        let statements = graph.statements();

        // 2 camera prep + 4 camera shadow + 1 placement + 5 per glyph
        // + vstack + crop + final overlay.
        assert_eq!(statements.len(), 10 + POINTER_GLYPH_COUNT * 5);

        assert_eq!(statements[0], "[1:v] scale=280:158, format=rgba [cam_scaled];");
        assert_eq!(
            statements[1],
            "[cam_scaled] geq=lum='p(X,Y)':a='if(lte(pow(max(0,abs(X-140)-120),2)+pow(max(0,abs(Y-79)-59),2),400),255,0)' [cam_shaped];"
        );
        assert_eq!(statements[6], "[0:v][cam] overlay=W-w-20:20 [bg];");
        assert_eq!(
            statements[statements.len() - 3],
            "[cell0][cell1][cell2][cell3][cell4][cell5][cell6][cell7][cell8][cell9][cell10] vstack=inputs=11 [atlas];"
        );
        // Cursor 48 plus shadow padding of 2 per cell.
        assert_eq!(
            statements[statements.len() - 2],
            "[atlas] crop=50:50:0:'(ID)*50' [cursor];"
        );
        assert_eq!(
            statements[statements.len() - 1],
            "[bg][cursor] overlay=x='X':y='Y':eval=frame [outv];"
        );
    }

    #[test]
    fn test_every_stream_name_produced_exactly_once() {
        let graph = assemble_default(None);
        let script = graph.script();

        let mut counts = std::collections::HashMap::new();
        let mut rest = script.as_str();
        while let Some(open) = rest.find('[') {
            let Some(close) = rest[open..].find(']') else {
                break;
            };
            let token = &rest[open + 1..open + close];
            *counts.entry(token.to_string()).or_insert(0u32) += 1;
            rest = &rest[open + close + 1..];
        }

        for (token, count) in &counts {
            if token.contains(':') {
                // Engine input pads appear once each.
                assert_eq!(*count, 1, "input [{token}] referenced {count} times");
            } else if token == "outv" {
                // Produced here, consumed by the -map directive.
                assert_eq!(*count, 1);
            } else {
                // Every intermediate stream: produced once, consumed once.
                assert_eq!(*count, 2, "stream [{token}] appears {count} times");
            }
        }

        // Display, camera, and all glyph inputs are wired in.
        assert!(counts.contains_key("0:v"));
        assert!(counts.contains_key("1:v"));
        for i in 0..POINTER_GLYPH_COUNT {
            assert!(counts.contains_key(&format!("{}:v", i + 3)));
        }
    }

    #[test]
    fn test_shadow_chains_for_camera_and_every_glyph() {
        let graph = assemble_default(None);
        let script = graph.script();

        let splits = script.matches("split=2").count();
        assert_eq!(splits, 1 + POINTER_GLYPH_COUNT);
        assert_eq!(script.matches("gblur=sigma=6").count(), 1);
        assert_eq!(
            script.matches("gblur=sigma=2").count(),
            POINTER_GLYPH_COUNT
        );
        assert_eq!(
            script.matches("pad=iw+6:ih+6:6:6:color=black@0").count(),
            1
        );
        assert_eq!(
            script.matches("pad=iw+2:ih+2:2:2:color=black@0").count(),
            POINTER_GLYPH_COUNT
        );
        assert_eq!(
            script.matches("overlay=0:0:format=auto").count(),
            1 + POINTER_GLYPH_COUNT
        );
    }

    #[test]
    fn test_camera_shapes_produce_distinct_masks() {
        let mut settings = RenderSettings::default();

        settings.camera.shape = CameraShape::Rectangle;
        let rect = FilterGraph::assemble(&settings, "X", "Y", "ID", None);
        assert_eq!(rect.statements()[1], "[cam_scaled] null [cam_shaped];");

        settings.camera.shape = CameraShape::Circle;
        let circle = FilterGraph::assemble(&settings, "X", "Y", "ID", None);
        assert_eq!(
            circle.statements()[1],
            "[cam_scaled] geq=lum='p(X,Y)':a='if(lte(pow(X-140,2)+pow(Y-79,2),6241),255,0)' [cam_shaped];"
        );

        settings.camera.shape = CameraShape::Rounded;
        let rounded = FilterGraph::assemble(&settings, "X", "Y", "ID", None);
        assert!(rounded.statements()[1].contains("max(0,abs(X-140)-120)"));
    }

    #[test]
    fn test_caption_suffix_chains_onto_final_overlay() {
        let path = PathBuf::from("/tmp/render session/captions.ass");
        let graph = assemble_default(Some(&path));
        let last = graph.statements().last().unwrap().clone();

        assert_eq!(
            last,
            "[bg][cursor] overlay=x='X':y='Y':eval=frame, subtitles='/tmp/render session/captions.ass' [outv];"
        );
    }

    #[test]
    fn test_escape_backslash_before_colon() {
        let escaped = escape_filter_path(Path::new("C:\\clips\\out.ass"));
        assert_eq!(escaped, "C\\:\\\\clips\\\\out.ass");

        let plain = escape_filter_path(Path::new("/tmp/captions.ass"));
        assert_eq!(plain, "/tmp/captions.ass");
    }

    #[test]
    fn test_compiled_expressions_flow_into_final_overlay() {
        let x = PiecewiseExpr::linear(&[0.0, 1.0], &[0.0, 1920.0]).unwrap();
        let y = PiecewiseExpr::linear(&[0.0, 1.0], &[540.0, 540.0]).unwrap();
        let id = PiecewiseExpr::step(&[0.0, 1.0], &[0.0, 1.0]).unwrap();

        let graph = FilterGraph::assemble(
            &RenderSettings::default(),
            &x.to_string(),
            &y.to_string(),
            &id.to_string(),
            None,
        );
        let last = graph.statements().last().unwrap();

        assert!(last.contains("x='(0.00+1920.0000*(t-0.0000))'"));
        assert!(last.contains("y='(540.00+0.0000*(t-0.0000))'"));
        let crop = &graph.statements()[graph.statements().len() - 2];
        assert!(crop.contains("'(if(lt(t,1.0000),0.00,1.00))*50'"));
    }
}
