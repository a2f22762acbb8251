//! Reader for OpenCV Haar cascade XML files.
//!
//! Two layouts are understood: the legacy `opencv-haar-classifier` one
//! (`<size>`, `<trees>`, `<stage_threshold>`) and the
//! `opencv-cascade-classifier` one written by `opencv_traincascade`
//! (`<width>`/`<height>`, `<weakClassifiers>` indexing a shared
//! `<features>` table). Only stumps over upright rectangles are accepted,
//! which covers the stock frontal-face cascades.

use roxmltree::{Document, Node};

use crate::detection::infrastructure::cascade::{
    Cascade, CascadeError, CascadeStage, FeatureRect, WeakClassifier,
};

pub fn parse(xml: &str) -> Result<Cascade, CascadeError> {
    let doc = Document::parse(xml)?;
    let root = elements(doc.root_element())
        .next()
        .ok_or_else(|| invalid("empty cascade document"))?;

    let cascade = if child_opt(root, "features").is_some() {
        parse_trained(root)?
    } else {
        parse_legacy(root)?
    };
    cascade.validate()?;
    Ok(cascade)
}

fn parse_legacy(root: Node) -> Result<Cascade, CascadeError> {
    let size = numbers(child(root, "size")?)?;
    let &[w, h] = size.as_slice() else {
        return Err(invalid(format!("<size> needs 2 values, got {}", size.len())));
    };
    let stages = items(child(root, "stages")?)
        .enumerate()
        .map(|(si, stage)| legacy_stage(si, stage))
        .collect::<Result<Vec<_>, _>>()?;
    Ok(Cascade {
        window: [coord(w)?, coord(h)?],
        stages,
    })
}

fn legacy_stage(si: usize, stage: Node) -> Result<CascadeStage, CascadeError> {
    let mut classifiers = Vec::new();
    for tree in items(child(stage, "trees")?) {
        let mut nodes = items(tree);
        let (Some(node), None) = (nodes.next(), nodes.next()) else {
            return Err(invalid(format!("stage {si}: only single-node trees are supported")));
        };
        if child_opt(node, "left_node").is_some() || child_opt(node, "right_node").is_some() {
            return Err(invalid(format!("stage {si}: only single-node trees are supported")));
        }
        classifiers.push(WeakClassifier {
            feature: feature_rects(child(node, "feature")?)?,
            threshold: number(child(node, "threshold")?)?,
            left: number(child(node, "left_val")?)?,
            right: number(child(node, "right_val")?)?,
        });
    }
    Ok(CascadeStage {
        threshold: number(child(stage, "stage_threshold")?)?,
        classifiers,
    })
}

fn parse_trained(root: Node) -> Result<Cascade, CascadeError> {
    for (key, expected) in [("stageType", "BOOST"), ("featureType", "HAAR")] {
        if let Some(node) = child_opt(root, key) {
            let value = text(node);
            if value.trim() != expected {
                return Err(invalid(format!(
                    "unsupported {key} `{}`, expected {expected}",
                    value.trim()
                )));
            }
        }
    }
    let width = coord(number(child(root, "width")?)?)?;
    let height = coord(number(child(root, "height")?)?)?;
    let features = items(child(root, "features")?)
        .map(feature_rects)
        .collect::<Result<Vec<_>, _>>()?;
    let stages = items(child(root, "stages")?)
        .enumerate()
        .map(|(si, stage)| trained_stage(si, stage, &features))
        .collect::<Result<Vec<_>, _>>()?;
    Ok(Cascade {
        window: [width, height],
        stages,
    })
}

fn trained_stage(
    si: usize,
    stage: Node,
    features: &[Vec<FeatureRect>],
) -> Result<CascadeStage, CascadeError> {
    let mut classifiers = Vec::new();
    for weak in items(child(stage, "weakClassifiers")?) {
        let nodes = numbers(child(weak, "internalNodes")?)?;
        let leaves = numbers(child(weak, "leafValues")?)?;
        let (&[_, _, index, threshold], &[left, right]) = (nodes.as_slice(), leaves.as_slice())
        else {
            return Err(invalid(format!("stage {si}: only stump classifiers are supported")));
        };
        let feature = features
            .get(coord(index)? as usize)
            .cloned()
            .ok_or_else(|| {
                invalid(format!(
                    "stage {si}: feature {index} not in a table of {}",
                    features.len()
                ))
            })?;
        classifiers.push(WeakClassifier {
            feature,
            threshold,
            left,
            right,
        });
    }
    Ok(CascadeStage {
        threshold: number(child(stage, "stageThreshold")?)?,
        classifiers,
    })
}

/// `<rects>` of a feature node; tilted features are rejected.
fn feature_rects(feature: Node) -> Result<Vec<FeatureRect>, CascadeError> {
    if let Some(tilted) = child_opt(feature, "tilted") {
        if number(tilted)? != 0.0 {
            return Err(invalid("tilted features are not supported"));
        }
    }
    items(child(feature, "rects")?)
        .map(|rect| {
            let values = numbers(rect)?;
            let &[x, y, w, h, weight] = values.as_slice() else {
                return Err(invalid(format!(
                    "rectangle needs 5 values, got {}",
                    values.len()
                )));
            };
            Ok(FeatureRect(coord(x)?, coord(y)?, coord(w)?, coord(h)?, weight))
        })
        .collect()
}

fn elements<'a, 'i>(node: Node<'a, 'i>) -> impl Iterator<Item = Node<'a, 'i>> {
    node.children().filter(|n| n.is_element())
}

/// OpenCV stores sequence entries as `<_>` elements.
fn items<'a, 'i>(node: Node<'a, 'i>) -> impl Iterator<Item = Node<'a, 'i>> {
    elements(node).filter(|n| n.has_tag_name("_"))
}

fn child_opt<'a, 'i>(node: Node<'a, 'i>, name: &str) -> Option<Node<'a, 'i>> {
    elements(node).find(|n| n.has_tag_name(name))
}

fn child<'a, 'i>(node: Node<'a, 'i>, name: &str) -> Result<Node<'a, 'i>, CascadeError> {
    child_opt(node, name)
        .ok_or_else(|| invalid(format!("<{}> has no <{name}>", node.tag_name().name())))
}

fn text(node: Node) -> String {
    node.descendants()
        .filter(|n| n.is_text())
        .filter_map(|n| n.text())
        .collect()
}

fn numbers(node: Node) -> Result<Vec<f64>, CascadeError> {
    text(node)
        .split_whitespace()
        .map(|token| {
            token.parse::<f64>().map_err(|_| {
                invalid(format!(
                    "<{}>: `{token}` is not a number",
                    node.tag_name().name()
                ))
            })
        })
        .collect()
}

fn number(node: Node) -> Result<f64, CascadeError> {
    match numbers(node)?.as_slice() {
        &[v] => Ok(v),
        other => Err(invalid(format!(
            "<{}> needs 1 value, got {}",
            node.tag_name().name(),
            other.len()
        ))),
    }
}

fn coord(v: f64) -> Result<u32, CascadeError> {
    if v >= 0.0 && v.fract() == 0.0 && v <= u32::MAX as f64 {
        Ok(v as u32)
    } else {
        Err(invalid(format!("`{v}` is not a pixel coordinate")))
    }
}

fn invalid(reason: impl Into<String>) -> CascadeError {
    CascadeError::Invalid(reason.into())
}
