use tracing::info;

use crate::db::Biofilter;
use crate::error::Result;
use crate::query::{render, DedupPolicy, Focus, QueryMode, QueryPlan, QueryRequest};

use super::{comment_header, non_empty, RowSink};

impl Biofilter {
    fn filter_plans<S: AsRef<str>>(&self, types: &[S]) -> Result<(Vec<String>, QueryPlan, Option<QueryPlan>)> {
        let out = non_empty(types)?;
        let request = QueryRequest::new(QueryMode::Filter, Focus::Main, out.columns).with_offsets();
        let plan = self.assemble(&request)?;
        let query2 = if self.has_user_knowledge() {
            Some(self.assemble(&request.with_user_knowledge())?)
        } else {
            None
        };
        Ok((out.header, plan, query2))
    }

    /// Streams the main filter's rows for the requested output types.
    ///
    /// When user knowledge is loaded a second statement reading it is
    /// unioned in, sharing the duplicate suppression of the first.
    pub fn generate_filter_output<S: AsRef<str>>(&mut self, types: &[S], sink: &mut dyn RowSink) -> Result<u64> {
        let (mut header, plan, query2) = self.filter_plans(types)?;
        comment_header(&mut header);
        sink.header(&header)?;
        let policy = DedupPolicy::for_duplicates(self.options().allow_duplicate_output);
        let rows = self.execute(&plan, query2.as_ref(), &[], policy, |row| sink.row(&row))?;
        sink.finish()?;
        info!(rows, user_knowledge = query2.is_some(), "filter.output.completed");
        Ok(rows)
    }

    /// The explain tree and statement text of the filter output plans.
    pub fn explain_filter_output<S: AsRef<str>>(&self, types: &[S]) -> Result<String> {
        let (_, plan, query2) = self.filter_plans(types)?;
        let policy = DedupPolicy::for_duplicates(self.options().allow_duplicate_output);
        let mut text = String::new();
        for plan in std::iter::once(&plan).chain(query2.as_ref()) {
            text.push_str(&plan.explain().to_string());
            text.push_str(&render(plan, policy.render_options()).sql);
        }
        Ok(text)
    }
}
