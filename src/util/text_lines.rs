/// Keep only the last `max_lines` lines of a block of text.
///
/// Blank lines are dropped before counting. When lines are cut, the result
/// starts with a single omission marker naming how many were skipped, so the
/// output never exceeds `max_lines + 1` lines.
#[derive(Debug, Clone, Copy)]
pub struct TailCap {
    pub max_lines: usize,
}

impl TailCap {
    pub const fn new(max_lines: usize) -> Self {
        Self { max_lines }
    }

    pub fn apply<'a, I>(&self, lines: I) -> String
    where
        I: IntoIterator<Item = &'a str>,
    {
        let kept: Vec<&str> = lines
            .into_iter()
            .map(str::trim_end)
            .filter(|l| !l.trim().is_empty())
            .collect();
        if kept.len() <= self.max_lines {
            return kept.join("\n");
        }
        let omitted = kept.len() - self.max_lines;
        let mut out = format!("... ({omitted} earlier line{} omitted)", plural(omitted));
        for l in &kept[omitted..] {
            out.push('\n');
            out.push_str(l);
        }
        out
    }
}

/// Convenience wrapper over [`TailCap`] for a single string.
pub fn cap_tail_lines(text: &str, max_lines: usize) -> String {
    TailCap::new(max_lines).apply(text.lines())
}

fn plural(n: usize) -> &'static str {
    if n == 1 {
        ""
    } else {
        "s"
    }
}
