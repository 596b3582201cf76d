//! Console rendering of tracker views: fixed-width tables with a newcomer
//! marker, a profile detail panel, and prefixed notices.

use std::io::{self, Write};

use orbit_core::{format_stamp, DisplaySink, EdgeView, FollowsBack, NoticeLevel, ProfileDetail};

pub struct ConsoleSink<W: Write> {
    out: W,
}

impl ConsoleSink<io::Stdout> {
    pub fn stdout() -> Self {
        Self { out: io::stdout() }
    }
}

impl<W: Write> ConsoleSink<W> {
    pub fn new(out: W) -> Self {
        Self { out }
    }

    /// Unprefixed text, for help output and the like.
    pub fn plain(&mut self, text: &str) {
        let result = writeln!(self.out, "{text}");
        self.report(result);
    }

    #[cfg(test)]
    pub fn into_inner(self) -> W {
        self.out
    }

    fn report(&self, result: io::Result<()>) {
        if let Err(err) = result {
            tracing::warn!(error = %err, "Console write failed");
        }
    }

    fn write_table(&mut self, title: &str, view: &EdgeView, empty_message: &str) -> io::Result<()> {
        writeln!(self.out)?;
        writeln!(self.out, "{title}")?;
        writeln!(
            self.out,
            "  followers: {}  following: {}  last update: {}",
            view.follower_count,
            view.following_count,
            view.last_update
                .map(format_stamp)
                .unwrap_or_else(|| "never".to_string()),
        )?;

        if view.rows.is_empty() {
            writeln!(self.out, "  {empty_message}")?;
            return self.out.flush();
        }

        writeln!(
            self.out,
            "    {:<24} {:<20} {}",
            "USER", "FIRST SEEN", "FOLLOWS BACK"
        )?;
        let mut any_new = false;
        for row in &view.rows {
            let marker = if row.is_new {
                any_new = true;
                "*"
            } else {
                " "
            };
            let first_seen = row.first_seen.map(format_stamp).unwrap_or_default();
            let follows_back = match row.follows_back {
                Some(FollowsBack::Yes) => "yes",
                Some(FollowsBack::No) => "no",
                Some(FollowsBack::Unknown) => "?",
                None => "",
            };
            writeln!(
                self.out,
                "  {marker} {:<24} {:<20} {}",
                row.login, first_seen, follows_back
            )?;
        }
        if any_new {
            writeln!(self.out, "  (* new since last refresh)")?;
        }
        self.out.flush()
    }

    fn write_detail(&mut self, login: &str, detail: &ProfileDetail) -> io::Result<()> {
        writeln!(self.out)?;
        writeln!(self.out, "Details for {login} (https://github.com/{login})")?;
        writeln!(
            self.out,
            "  location:        {}",
            detail.location.as_deref().unwrap_or("-")
        )?;
        writeln!(self.out, "  public repos:    {}", detail.public_repos)?;
        writeln!(self.out, "  public gists:    {}", detail.public_gists)?;
        writeln!(self.out, "  followers:       {}", detail.followers)?;
        writeln!(self.out, "  following:       {}", detail.following)?;
        writeln!(
            self.out,
            "  created at:      {}",
            if detail.created_at.is_empty() {
                "-"
            } else {
                detail.created_at.as_str()
            }
        )?;
        writeln!(
            self.out,
            "  site admin:      {}",
            if detail.site_admin { "yes" } else { "no" }
        )?;
        writeln!(self.out, "  community score: {}", detail.score)?;
        self.out.flush()
    }
}

impl<W: Write> DisplaySink for ConsoleSink<W> {
    fn render(&mut self, title: &str, view: &EdgeView, empty_message: &str) {
        let result = self.write_table(title, view, empty_message);
        self.report(result);
    }

    fn show_detail(&mut self, login: &str, detail: &ProfileDetail) {
        let result = self.write_detail(login, detail);
        self.report(result);
    }

    fn clear_detail(&mut self) {
        let result = writeln!(self.out, "  (no details to show)");
        self.report(result);
    }

    fn notify(&mut self, level: NoticeLevel, message: &str) {
        let prefix = match level {
            NoticeLevel::Info => "note",
            NoticeLevel::Warning => "warning",
            NoticeLevel::Error => "error",
        };
        let result = writeln!(self.out, "{prefix}: {message}");
        self.report(result);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use orbit_core::{parse_stamp, EdgeRow, ViewOrigin};

    fn rendered(view: &EdgeView) -> String {
        let mut sink = ConsoleSink::new(Vec::new());
        sink.render("Followers of alice:", view, "(No followers found for this user.)");
        String::from_utf8(sink.into_inner()).unwrap()
    }

    fn row(login: &str, is_new: bool, follows_back: Option<FollowsBack>) -> EdgeRow {
        EdgeRow {
            login: login.to_string(),
            first_seen: parse_stamp("2025-01-05 09:12:44"),
            is_new,
            follows_back,
        }
    }

    #[test]
    fn table_marks_newcomers_and_adds_a_legend() {
        let view = EdgeView {
            rows: vec![row("bob", false, None), row("carol", true, None)],
            origin: ViewOrigin::Fetched,
            last_update: parse_stamp("2025-01-05 09:12:44"),
            follower_count: 2,
            following_count: 1,
            persist_error: None,
        };
        let text = rendered(&view);
        assert!(text.contains("Followers of alice:"));
        assert!(text.contains("followers: 2  following: 1  last update: 2025-01-05 09:12:44"));
        assert!(text.contains("* carol"));
        assert!(text.contains("(* new since last refresh)"));
    }

    #[test]
    fn table_without_newcomers_has_no_legend() {
        let view = EdgeView {
            rows: vec![row("bob", false, None)],
            origin: ViewOrigin::Cached,
            last_update: None,
            follower_count: 1,
            following_count: 0,
            persist_error: None,
        };
        let text = rendered(&view);
        assert!(text.contains("last update: never"));
        assert!(!text.contains("(* new since last refresh)"));
    }

    #[test]
    fn empty_view_prints_the_placeholder_instead_of_headers() {
        let text = rendered(&EdgeView::empty());
        assert!(text.contains("(No followers found for this user.)"));
        assert!(!text.contains("FIRST SEEN"));
    }

    #[test]
    fn follows_back_column_renders_all_three_states() {
        let view = EdgeView {
            rows: vec![
                row("bob", false, Some(FollowsBack::Yes)),
                row("carol", false, Some(FollowsBack::No)),
                row("dave", false, Some(FollowsBack::Unknown)),
            ],
            origin: ViewOrigin::Fetched,
            last_update: None,
            follower_count: 0,
            following_count: 3,
            persist_error: None,
        };
        let text = rendered(&view);
        let bob = text.lines().find(|l| l.contains("bob")).unwrap();
        let carol = text.lines().find(|l| l.contains("carol")).unwrap();
        let dave = text.lines().find(|l| l.contains("dave")).unwrap();
        assert!(bob.trim_end().ends_with("yes"));
        assert!(carol.trim_end().ends_with("no"));
        assert!(dave.trim_end().ends_with('?'));
    }

    #[test]
    fn notices_carry_their_level_prefix() {
        let mut sink = ConsoleSink::new(Vec::new());
        sink.notify(NoticeLevel::Warning, "rate limit reached");
        sink.notify(NoticeLevel::Error, "it broke");
        let text = String::from_utf8(sink.into_inner()).unwrap();
        assert!(text.contains("warning: rate limit reached"));
        assert!(text.contains("error: it broke"));
    }

    #[test]
    fn detail_panel_lists_profile_link_and_score() {
        let mut sink = ConsoleSink::new(Vec::new());
        let detail = ProfileDetail {
            location: None,
            public_repos: 10,
            public_gists: 2,
            following: 7,
            followers: 100,
            created_at: "2020-01-01T00:00:00Z".to_string(),
            site_admin: false,
            score: 227,
        };
        sink.show_detail("carol", &detail);
        let text = String::from_utf8(sink.into_inner()).unwrap();
        assert!(text.contains("https://github.com/carol"));
        assert!(text.contains("location:        -"));
        assert!(text.contains("community score: 227"));
        assert!(text.contains("site admin:      no"));
    }
}
