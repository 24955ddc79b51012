use crate::cli::{Cli, Command, ImportArgs, InvitationsArgs, OutputFormat, OwnerArgs};
use anyhow::{bail, Context};
use famtree_core::codec::legacy::{legacy_row_from_member, rows_from_legacy, LegacyMemberRow};
use famtree_core::{
    FamilyGraph, FamilyMember, InvitationService, MemberRepository, SqliteInvitationRepository,
    SqliteMemberRepository, TreeService, TreeServiceConfig,
};
use log::info;
use rusqlite::Connection;
use std::path::Path;

pub fn init_logging(cli: &Cli) -> anyhow::Result<()> {
    let Some(log_dir) = &cli.log_dir else {
        return Ok(());
    };
    let level = cli
        .log_level
        .as_deref()
        .unwrap_or_else(|| famtree_core::default_log_level());
    famtree_core::init_logging(level, log_dir).context("failed to initialize logging")?;
    Ok(())
}

pub fn run_command(cli: Cli) -> anyhow::Result<()> {
    match cli.command {
        Command::Ping => {
            println!("famtree_core ping={}", famtree_core::ping());
            println!("famtree_core version={}", famtree_core::core_version());
            Ok(())
        }
        Command::Show(args) => cmd_show(&cli.db, args, cli.format),
        Command::Export(args) => cmd_export(&cli.db, args),
        Command::Import(args) => cmd_import(&cli.db, args),
        Command::Invitations(args) => cmd_invitations(&cli.db, args, cli.format),
    }
}

fn open(db: &Path) -> anyhow::Result<Connection> {
    famtree_core::open_db(db).with_context(|| format!("failed to open `{}`", db.display()))
}

fn cmd_show(db: &Path, args: OwnerArgs, format: OutputFormat) -> anyhow::Result<()> {
    let conn = open(db)?;
    let repo = SqliteMemberRepository::try_new(&conn)?;
    let service = TreeService::load(repo, args.owner, TreeServiceConfig::default())?;
    let graph = service.graph();

    if let OutputFormat::Json = format {
        let members: Vec<&FamilyMember> = graph.members().collect();
        println!("{}", serde_json::to_string_pretty(&members)?);
        return Ok(());
    }

    println!("owner {} members={}", graph.owner_id(), graph.len());
    for member in graph.members() {
        print_member(graph, member);
    }
    for issue in service.decode_issues() {
        println!("issue: {issue}");
    }
    match graph.check_invariants() {
        Ok(()) => println!("invariants: ok"),
        Err(violation) => println!("invariants: {violation}"),
    }
    Ok(())
}

fn print_member(graph: &FamilyGraph, member: &FamilyMember) {
    let marker = if graph.root().map(|root| root.id) == Some(member.id) {
        "*"
    } else {
        " "
    };
    let position = member
        .position
        .map(|position| format!("({:.0}, {:.0})", position.x, position.y))
        .unwrap_or_else(|| "-".to_string());
    let state = match member.linked_user_id {
        Some(user_id) => format!("linked:{user_id}"),
        None => "placeholder".to_string(),
    };
    println!(
        "{marker} {} {} [{}] {} {} at {position}",
        member.id,
        member.name,
        member.gender.as_str(),
        member.relation.kind().as_str(),
        state
    );
    if let Some(spouse_id) = member.spouse_id {
        println!("    spouse   {spouse_id}");
    }
    for parent_id in &member.parent_ids {
        println!("    parent   {parent_id}");
    }
    for child_id in &member.children_ids {
        println!("    child    {child_id}");
    }
}

fn cmd_export(db: &Path, args: OwnerArgs) -> anyhow::Result<()> {
    let conn = open(db)?;
    let repo = SqliteMemberRepository::try_new(&conn)?;
    let service = TreeService::load(repo, args.owner, TreeServiceConfig::default())?;
    let rows: Vec<LegacyMemberRow> = service
        .graph()
        .members()
        .map(legacy_row_from_member)
        .collect();
    println!("{}", serde_json::to_string_pretty(&rows)?);
    Ok(())
}

fn cmd_import(db: &Path, args: ImportArgs) -> anyhow::Result<()> {
    let text = std::fs::read_to_string(&args.file)
        .with_context(|| format!("failed to read `{}`", args.file.display()))?;
    let legacy: Vec<LegacyMemberRow> =
        serde_json::from_str(&text).context("file is not an array of legacy member rows")?;
    let (rows, issues) = rows_from_legacy(&legacy);
    for issue in &issues {
        eprintln!("issue: {issue}");
    }
    if rows.is_empty() && !legacy.is_empty() {
        bail!("no importable rows in `{}`", args.file.display());
    }

    let mut conn = open(db)?;
    let tx = conn.transaction()?;
    {
        let repo = SqliteMemberRepository::try_new(&tx)?;
        for row in &rows {
            repo.insert(row)
                .with_context(|| format!("failed to insert member {}", row.id))?;
        }
    }
    tx.commit()?;

    info!(
        "event=legacy_import module=cli status=ok row_count={} issue_count={}",
        rows.len(),
        issues.len()
    );
    println!("imported {} rows ({} issues)", rows.len(), issues.len());
    Ok(())
}

fn cmd_invitations(db: &Path, args: InvitationsArgs, format: OutputFormat) -> anyhow::Result<()> {
    let conn = open(db)?;
    let service = InvitationService::new(
        SqliteInvitationRepository::try_new(&conn)?,
        SqliteMemberRepository::try_new(&conn)?,
    );
    let invitations = if args.pending {
        service.list_pending_for(args.user)?
    } else {
        service.list(args.user)?
    };

    if let OutputFormat::Json = format {
        println!("{}", serde_json::to_string_pretty(&invitations)?);
        return Ok(());
    }
    if invitations.is_empty() {
        println!("no invitations");
    }
    for invitation in &invitations {
        let direction = if invitation.receiver_id == args.user {
            "from"
        } else {
            "to"
        };
        let peer = if invitation.receiver_id == args.user {
            invitation.sender_id
        } else {
            invitation.receiver_id
        };
        println!(
            "{} {} {direction} {peer} member={} relation={}",
            invitation.id,
            invitation.status.as_str(),
            invitation.member_id,
            invitation.relation_type
        );
    }
    Ok(())
}
