use super::graph::{Branch, DecisionDnnf, Node, NodeIndex};
use anyhow::{Context, Result};
use std::io::{BufWriter, Write};

/// A structure used to write a [`DecisionDnnf`] in the d4 output format.
///
/// Node indices are assigned on first visit, starting from the root at
/// index 1. Each node emits a header line (`o`, `a`, `t` or `f`), and each
/// branch emits one line carrying its unit literals. The certified variant
/// additionally emits the resolution-reason indices on the `o` headers and a
/// fresh/cached flag on each branch line.
pub struct DdnnfWriter;

impl DdnnfWriter {
    /// Writes the graph in the d4 format.
    ///
    /// # Errors
    ///
    /// An error is raised when an I/O exception occurs.
    pub fn write<W>(writer: W, ddnnf: &DecisionDnnf) -> Result<()>
    where
        W: Write,
    {
        Self::write_opt(writer, ddnnf, false)
    }

    /// Writes the graph in the certified d4 format, with resolution-reason
    /// lists on the disjunction headers and fresh/cached flags on the
    /// branches.
    ///
    /// # Errors
    ///
    /// An error is raised when an I/O exception occurs.
    pub fn write_certified<W>(writer: W, ddnnf: &DecisionDnnf) -> Result<()>
    where
        W: Write,
    {
        Self::write_opt(writer, ddnnf, true)
    }

    fn write_opt<W>(writer: W, ddnnf: &DecisionDnnf, certified: bool) -> Result<()>
    where
        W: Write,
    {
        let mut data = WriterData {
            out: BufWriter::new(writer),
            ddnnf,
            certified,
            ids: vec![None; ddnnf.n_nodes()],
            next_id: 0,
        };
        data.write_root(ddnnf.root())
            .context("while writing a d4 formatted Decision-DNNF")
    }
}

struct WriterData<'a, W>
where
    W: Write,
{
    out: BufWriter<W>,
    ddnnf: &'a DecisionDnnf,
    certified: bool,
    ids: Vec<Option<usize>>,
    next_id: usize,
}

impl<W> WriterData<'_, W>
where
    W: Write,
{
    fn write_root(&mut self, root: Branch) -> Result<()> {
        let root_id = self.fresh_id();
        if self.certified {
            write!(self.out, "o {root_id} 1 ")?;
            for r in self.ddnnf.root_reasons() {
                write!(self.out, "{r} ")?;
            }
            writeln!(self.out, "0")?;
        } else {
            writeln!(self.out, "o {root_id} 0")?;
        }
        self.write_node(root.target)?;
        self.write_branch(root_id, root)?;
        self.out.flush()?;
        Ok(())
    }

    fn write_node(&mut self, idx: NodeIndex) -> Result<()> {
        if self.ids[idx].is_some() {
            return Ok(());
        }
        let id = self.fresh_id();
        self.ids[idx] = Some(id);
        match self.ddnnf.node(idx) {
            Node::True => writeln!(self.out, "t {id} 0")?,
            Node::False => writeln!(self.out, "f {id} 0")?,
            Node::Unary(b) => {
                self.write_or_header(id, idx)?;
                self.write_node(b.target)?;
                self.write_branch(id, *b)?;
            }
            Node::Decision(pos, neg) => {
                let (pos, neg) = (*pos, *neg);
                self.write_or_header(id, idx)?;
                self.write_node(pos.target)?;
                self.write_node(neg.target)?;
                self.write_branch(id, pos)?;
                self.write_branch(id, neg)?;
            }
            Node::And(children) => {
                writeln!(self.out, "a {id} 0")?;
                for (rank, child) in children.clone().into_iter().enumerate() {
                    self.write_node(child)?;
                    let child_id = self.ids[child].expect("children are written first");
                    if self.certified {
                        let cached = self.ddnnf.and_flags(idx).get(rank) == Some(&true);
                        writeln!(self.out, "{id} {child_id} {} 0", if cached { "1" } else { "2" })?;
                    } else {
                        writeln!(self.out, "{id} {child_id} 0")?;
                    }
                }
            }
        }
        Ok(())
    }

    fn write_or_header(&mut self, id: usize, idx: NodeIndex) -> Result<()> {
        if self.certified {
            write!(self.out, "o {id} 2 ")?;
            for r in self.ddnnf.node_reasons(idx) {
                write!(self.out, "{r} ")?;
            }
            writeln!(self.out, "0")?;
        } else {
            writeln!(self.out, "o {id} 0")?;
        }
        Ok(())
    }

    fn write_branch(&mut self, source_id: usize, b: Branch) -> Result<()> {
        let target_id = self.ids[b.target].expect("branch targets are written first");
        write!(self.out, "{source_id} {target_id} ")?;
        if self.certified {
            write!(self.out, "{} ", if b.from_cache { "1" } else { "2" })?;
        }
        for l in self.ddnnf.units_from(b.units) {
            write!(self.out, "{l} ")?;
        }
        writeln!(self.out, "0")?;
        Ok(())
    }

    fn fresh_id(&mut self) -> usize {
        self.next_id += 1;
        self.next_id
    }
}
